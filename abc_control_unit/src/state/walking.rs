//! Walking state flags.

use bitflags::bitflags;

bitflags! {
    /// Walking handshake between the command surface, the tick and the
    /// gait generator.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WalkingFlags: u8 {
        /// The gait generator drives the foot targets.
        const WALKING = 0x01;
        /// A stop-walking request has been armed.
        const ENDING  = 0x02;
        /// The generator's last tick produced a trajectory.
        const SOLVED  = 0x04;
    }
}

impl WalkingFlags {
    /// Walking with a live trajectory.
    #[inline]
    pub const fn is_walking_and_solved(self) -> bool {
        self.contains(Self::WALKING.union(Self::SOLVED))
    }
}
