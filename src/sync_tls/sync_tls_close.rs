// Close coordination for the reader and writer halves
//
// Each half closes independently. Full teardown (engine released, both
// transport halves closed) happens exactly once: either when the second
// half closes, or immediately when an operation fails.

/// Which adapter a close request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Reader,
    Writer,
}

#[derive(Debug)]
pub struct CloseCoordinator {
    reader_open: bool,
    writer_open: bool,
    torn_down: bool,
}

impl CloseCoordinator {
    pub fn new() -> Self {
        Self {
            reader_open: true,
            writer_open: true,
            torn_down: false,
        }
    }

    /// Mark one side closed.
    ///
    /// Returns true when this call observed the other side already closed
    /// and the caller must now perform the full teardown.
    pub fn close_side(&mut self, side: Side) -> bool {
        match side {
            Side::Reader => self.reader_open = false,
            Side::Writer => self.writer_open = false,
        }
        !self.reader_open && !self.writer_open && !self.torn_down
    }

    /// Claim the teardown. Only the first caller gets true.
    pub fn begin_teardown(&mut self) -> bool {
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.reader_open = false;
        self.writer_open = false;
        true
    }

    pub fn is_open(&self, side: Side) -> bool {
        match side {
            Side::Reader => self.reader_open,
            Side::Writer => self.writer_open,
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}
