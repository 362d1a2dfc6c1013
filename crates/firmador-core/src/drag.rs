//! Press → move* → release tracking for the signature marker
//!
//! Only the offset at release time leaves this module; intermediate pointer
//! positions are never observed by the signing workflow.

/// A pixel offset in viewer space (top-left origin, Y down)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

impl Offset {
    pub const ORIGIN: Offset = Offset { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DragState {
    Resting {
        offset: Offset,
    },
    Dragging {
        /// Marker offset when the press started
        origin: Offset,
        /// Pointer position at press
        pointer_start: Offset,
        /// Marker offset following the latest move
        current: Offset,
    },
}

/// Bounded drag state machine for the signature marker
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragTracker {
    state: DragState,
}

impl Default for DragTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl DragTracker {
    pub fn new() -> Self {
        Self {
            state: DragState::Resting {
                offset: Offset::ORIGIN,
            },
        }
    }

    /// Start dragging. A second press while dragging restarts from the
    /// marker's current position.
    pub fn press(&mut self, pointer: Offset) {
        let origin = self.current();
        self.state = DragState::Dragging {
            origin,
            pointer_start: pointer,
            current: origin,
        };
    }

    /// Follow the pointer. Ignored unless a press is in progress.
    pub fn move_to(&mut self, pointer: Offset) {
        if let DragState::Dragging {
            origin,
            pointer_start,
            ..
        } = self.state
        {
            self.state = DragState::Dragging {
                origin,
                pointer_start,
                current: Offset::new(
                    origin.x + (pointer.x - pointer_start.x),
                    origin.y + (pointer.y - pointer_start.y),
                ),
            };
        }
    }

    /// Finish the drag and return where the marker came to rest
    pub fn release(&mut self) -> Offset {
        let offset = self.current();
        self.state = DragState::Resting { offset };
        offset
    }

    /// Place the marker directly, without a drag
    pub fn place(&mut self, offset: Offset) {
        self.state = DragState::Resting { offset };
    }

    /// Back to the origin, e.g. when a new document is loaded
    pub fn reset(&mut self) {
        self.place(Offset::ORIGIN);
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// The last released offset. While a drag is in progress this is still
    /// the offset from before the press.
    pub fn settled(&self) -> Offset {
        match self.state {
            DragState::Resting { offset } => offset,
            DragState::Dragging { origin, .. } => origin,
        }
    }

    fn current(&self) -> Offset {
        match self.state {
            DragState::Resting { offset } => offset,
            DragState::Dragging { current, .. } => current,
        }
    }
}
