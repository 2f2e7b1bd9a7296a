/// Raised by `Game` mutation methods when a caller attempts something the
/// data-model invariants forbid. `ww-engine` maps every variant onto
/// `INVARIANT_VIOLATION` and aborts only the offending game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    WrongSeatCount { found: usize },
    DuplicateSeatNumber { seat: ww_core::Position },
    WrongRoleComposition,
    SeatNotFound { seat: ww_core::Position },
    SeatNotAlive { seat: ww_core::Position },
    PotionAlreadyUsed { potion: &'static str },
    SaveAndPoisonSameNight,
    WinnerAlreadySet,
    PendingDeathNotAlive { seat: ww_core::Position },
    NoHunterPending,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StateError::WrongSeatCount { found } => {
                write!(f, "expected {} seats, found {found}", ww_core::SEAT_COUNT)
            }
            StateError::DuplicateSeatNumber { seat } => {
                write!(f, "duplicate seat number {seat}")
            }
            StateError::WrongRoleComposition => {
                write!(f, "role composition does not match the standard distribution")
            }
            StateError::SeatNotFound { seat } => write!(f, "no such seat: {seat}"),
            StateError::SeatNotAlive { seat } => write!(f, "seat {seat} is not alive"),
            StateError::PotionAlreadyUsed { potion } => {
                write!(f, "{potion} potion already used this game")
            }
            StateError::SaveAndPoisonSameNight => {
                write!(f, "witch may not save and poison in the same night")
            }
            StateError::WinnerAlreadySet => write!(f, "winner has already been decided"),
            StateError::PendingDeathNotAlive { seat } => {
                write!(f, "seat {seat} scheduled to die but is not currently alive")
            }
            StateError::NoHunterPending => write!(f, "no hunter shot is currently pending"),
        }
    }
}

impl std::error::Error for StateError {}
