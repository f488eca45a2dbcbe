#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Suit {
    C = 0,
    D = 1,
    H = 2,
    S = 3,
}

impl Suit {
    pub const fn all() -> [Self; 4] {
        [Self::C, Self::D, Self::H, Self::S]
    }
}

impl From<u8> for Suit {
    fn from(n: u8) -> Self {
        match n {
            0 => Self::C,
            1 => Self::D,
            2 => Self::H,
            3 => Self::S,
            _ => panic!("invalid suit index"),
        }
    }
}

/// mask of all 13 ranks of this suit in a 52-bit hand
impl From<Suit> for u64 {
    fn from(s: Suit) -> Self {
        const CLUBS: u64 = 0x0001_1111_1111_1111;
        CLUBS << (s as u64)
    }
}

impl std::fmt::Display for Suit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::C => write!(f, "c"),
            Self::D => write!(f, "d"),
            Self::H => write!(f, "h"),
            Self::S => write!(f, "s"),
        }
    }
}

impl crate::Arbitrary for Suit {
    fn random() -> Self {
        use rand::Rng;
        Self::from(rand::thread_rng().gen_range(0..4u8))
    }
}
