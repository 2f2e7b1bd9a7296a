use ww_core::Position;
use ww_roles::Team;

/// Who is allowed to see a given event or audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Visibility {
    Public,
    SeatPrivate(Position),
    TeamPrivate(Team),
    Debug,
}

impl Visibility {
    /// Whether a subscriber occupying `viewer_seat` (or `None` for a
    /// spectator with no seat) may receive something tagged with this
    /// visibility. `viewer_team` is the viewer's team, when known.
    pub fn visible_to(&self, viewer_seat: Option<Position>, viewer_team: Option<Team>) -> bool {
        match self {
            Visibility::Public => true,
            Visibility::SeatPrivate(seat) => viewer_seat == Some(*seat),
            Visibility::TeamPrivate(team) => viewer_team == Some(*team),
            Visibility::Debug => false,
        }
    }
}
