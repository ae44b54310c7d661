/// Track state enumeration for the tracker's track lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Started, not yet seen in enough consecutive frames to be reported
    #[default]
    New,
    /// Confirmed and matched in the latest frame
    Tracked,
    /// Coasting on its motion estimate after a missed frame
    Lost,
    /// Coasted too long; dropped at the end of the update
    Removed,
}
