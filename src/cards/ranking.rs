use super::rank::Rank;

/// A hand's category with its defining ranks.
///
/// Ordered by strength; kicker cards break ties within a category.
#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub enum Ranking {
    HighCard(Rank),        // 4 kickers
    OnePair(Rank),         // 3 kickers
    TwoPair(Rank, Rank),   // 1 kicker
    ThreeOAK(Rank),        // 2 kickers
    Straight(Rank),        // 0 kickers
    Flush(Rank),           // 4 kickers
    FullHouse(Rank, Rank), // 0 kickers
    FourOAK(Rank),         // 1 kicker
    StraightFlush(Rank),   // 0 kickers
}

impl Ranking {
    pub fn category(&self) -> u8 {
        match self {
            Ranking::HighCard(_) => 0,
            Ranking::OnePair(_) => 1,
            Ranking::TwoPair(_, _) => 2,
            Ranking::ThreeOAK(_) => 3,
            Ranking::Straight(_) => 4,
            Ranking::Flush(_) => 5,
            Ranking::FullHouse(_, _) => 6,
            Ranking::FourOAK(_) => 7,
            Ranking::StraightFlush(_) => 8,
        }
    }
    pub fn n_kickers(&self) -> usize {
        match self {
            Ranking::HighCard(_) => 4,
            Ranking::Flush(_) => 4,
            Ranking::OnePair(_) => 3,
            Ranking::ThreeOAK(_) => 2,
            Ranking::FourOAK(_) | Ranking::TwoPair(_, _) => 1,
            _ => 0,
        }
    }
}

impl std::fmt::Display for Ranking {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Ranking::FullHouse(r1, r2) => write!(f, "FullHouse     {}{}", r1, r2),
            Ranking::TwoPair(r1, r2) => write!(f, "TwoPair       {}{}", r1, r2),
            Ranking::HighCard(r) => write!(f, "HighCard      {} ", r),
            Ranking::OnePair(r) => write!(f, "OnePair       {} ", r),
            Ranking::ThreeOAK(r) => write!(f, "ThreeOfAKind  {} ", r),
            Ranking::Straight(r) => write!(f, "Straight      {} ", r),
            Ranking::FourOAK(r) => write!(f, "FourOfAKind   {} ", r),
            Ranking::Flush(r) => write!(f, "Flush         {} ", r),
            Ranking::StraightFlush(r) => write!(f, "StraightFlush {} ", r),
        }
    }
}
