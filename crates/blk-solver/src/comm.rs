//! Process-group handle passed to the direct solvers.
//!
//! Only what the back-ends need to know about their group is exposed here;
//! message passing itself belongs to the communication layer.

/// A group of cooperating processes.
///
/// Operations that take a communicator are collective: every member must
/// make the same calls in the same order.
pub trait Communicator {
    /// Index of this process within the group.
    fn rank(&self) -> usize;

    /// Number of processes in the group.
    fn size(&self) -> usize;

    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Single-process communicator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }
}
