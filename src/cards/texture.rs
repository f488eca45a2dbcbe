use super::card::Card;
use super::hand::Hand;
use super::rank::Rank;

/// all 5-long rank windows that make a straight, wheel included
fn straight_windows() -> impl Iterator<Item = u16> {
    const WHEEL: u16 = 0b_1000000001111;
    (4..=12u16)
        .map(|hi| 0b_11111 << (hi - 4))
        .chain(std::iter::once(WHEEL))
}

/// Structural features of a 3-5 card board, all invariant
/// under any permutation of the four suits.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardFeatures {
    pub num_suits: u8,
    pub max_suit_count: u8,
    pub is_paired: bool,
    pub is_trips: bool,
    pub gaps: u8,
    pub straight_draws: u8,
    pub straight_made: bool,
    pub connectedness: f64,
    pub rank_distribution: [u8; 13],
    pub canonical_pattern: u32,
}

impl From<Hand> for BoardFeatures {
    fn from(board: Hand) -> Self {
        assert!((3..=5).contains(&board.size()));
        let suits = board.suit_count();
        let ranks = board.rank_count();
        let mask = board.rank_mask();
        let distinct = mask.count_ones() as u8;
        let gaps = Self::gap_sum(mask);
        let made = straight_windows().any(|w| mask & w == w);
        let draws = straight_windows()
            .filter(|w| (mask & w).count_ones() >= 3)
            .filter(|w| mask & w != *w)
            .count() as u8;
        Self {
            num_suits: suits.iter().filter(|&&n| n > 0).count() as u8,
            max_suit_count: suits.iter().copied().max().unwrap_or(0),
            is_paired: ranks.iter().any(|&n| n >= 2),
            is_trips: ranks.iter().any(|&n| n >= 3),
            gaps,
            straight_draws: draws,
            straight_made: made,
            connectedness: Self::connectedness(gaps, distinct),
            rank_distribution: ranks,
            canonical_pattern: Self::pattern(&suits, &ranks),
        }
    }
}

impl BoardFeatures {
    /// sum of interior gaps across the sorted distinct ranks
    fn gap_sum(mask: u16) -> u8 {
        let positions = (0..13u16)
            .filter(|i| mask & (1 << i) != 0)
            .collect::<Vec<_>>();
        positions
            .windows(2)
            .map(|w| (w[1] - w[0] - 1) as u8)
            .sum()
    }

    /// 1.0 for a run of consecutive ranks, 0.0 for the most spread board
    fn connectedness(gaps: u8, distinct: u8) -> f64 {
        let worst = 13 - distinct;
        if distinct < 2 || worst == 0 {
            1.0
        } else {
            1.0 - (gaps as f64 / worst as f64).min(1.0)
        }
    }

    /// suit-permutation-invariant encoding: sorted suit-class sizes
    /// in the top 12 bits, the sorted rank multiset in the low 20.
    fn pattern(suits: &[u8; 4], ranks: &[u8; 13]) -> u32 {
        let mut classes = *suits;
        classes.sort_unstable_by(|a, b| b.cmp(a));
        let profile = classes.iter().fold(0u32, |acc, &n| acc << 3 | n as u32);
        let multiset = (0..13)
            .rev()
            .flat_map(|i| std::iter::repeat(i as u32 + 1).take(ranks[i] as usize))
            .fold(0u32, |acc, r| acc << 4 | r);
        profile << 20 | multiset
    }
}

/// strategic impact classes for a dealt turn or river card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Pairing = 0,
    FlushComplete = 1,
    FlushAdvance = 2,
    StraightComplete = 3,
    StraightAdvance = 4,
    HighBand = 5,
    MiddleBand = 6,
    LowBand = 7,
}

impl Transition {
    /// classify the impact of `card` landing on `base`
    fn classify(base: Hand, card: Card) -> Self {
        let next = Hand::add(base, Hand::from(card));
        if base.rank_count()[card.rank() as usize] > 0 {
            return Self::Pairing;
        }
        let suited = next.of(&card.suit()).size();
        if suited >= 4 {
            return Self::FlushComplete;
        }
        if suited == 3 {
            return Self::FlushAdvance;
        }
        let mask = next.rank_mask();
        let bit = u16::from(card.rank());
        let through = straight_windows()
            .filter(|w| w & bit != 0)
            .map(|w| (mask & w).count_ones())
            .max()
            .unwrap_or(0);
        if through >= 4 {
            return Self::StraightComplete;
        }
        if through == 3 {
            return Self::StraightAdvance;
        }
        match card.rank() {
            r if r >= Rank::Ten => Self::HighBand,
            r if r >= Rank::Six => Self::MiddleBand,
            _ => Self::LowBand,
        }
    }

    pub fn turn(flop: Hand, turn: Card) -> Self {
        assert!(flop.size() == 3);
        Self::classify(flop, turn)
    }

    pub fn river(first4: Hand, river: Card) -> Self {
        assert!(first4.size() == 4);
        Self::classify(first4, river)
    }
}

impl From<Transition> for u8 {
    fn from(t: Transition) -> u8 {
        t as u8
    }
}
impl From<u8> for Transition {
    fn from(n: u8) -> Self {
        match n {
            0 => Self::Pairing,
            1 => Self::FlushComplete,
            2 => Self::FlushAdvance,
            3 => Self::StraightComplete,
            4 => Self::StraightAdvance,
            5 => Self::HighBand,
            6 => Self::MiddleBand,
            7 => Self::LowBand,
            _ => panic!("invalid transition class"),
        }
    }
}
