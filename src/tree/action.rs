/// A betting decision. The derived ordering is the canonical child
/// ordering of the tree: Fold < Call < Raise. Checks encode as Call
/// and opening bets as Raise, so the history alphabet is `{f, c, r}`.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Action {
    Fold = 0,
    Call = 1,
    Raise = 2,
}

impl Action {
    pub const fn all() -> [Self; 3] {
        [Self::Fold, Self::Call, Self::Raise]
    }
}

impl From<u8> for Action {
    fn from(n: u8) -> Self {
        match n {
            0 => Self::Fold,
            1 => Self::Call,
            2 => Self::Raise,
            _ => panic!("invalid action index"),
        }
    }
}
impl From<Action> for u8 {
    fn from(a: Action) -> u8 {
        a as u8
    }
}

impl From<Action> for char {
    fn from(a: Action) -> char {
        match a {
            Action::Fold => 'f',
            Action::Call => 'c',
            Action::Raise => 'r',
        }
    }
}
impl From<char> for Action {
    fn from(c: char) -> Self {
        match c {
            'f' => Self::Fold,
            'c' => Self::Call,
            'r' => Self::Raise,
            _ => panic!("invalid action char"),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}
