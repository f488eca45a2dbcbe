use super::hand::Hand;
use super::kicks::Kickers;
use super::rank::Rank;
use super::ranking::Ranking;
use super::suit::Suit;

/// A lazy evaluator for a hand's strength.
///
/// Works on the compact bit representation of the Hand, searching
/// for the best category from the top of the ladder down.
pub struct Evaluator(Hand);

impl From<Hand> for Evaluator {
    fn from(h: Hand) -> Self {
        Self(h)
    }
}

impl Evaluator {
    pub fn find_ranking(&self) -> Ranking {
        None.or_else(|| self.find_straight_flush())
            .or_else(|| self.find_4_oak())
            .or_else(|| self.find_3_oak_2_oak())
            .or_else(|| self.find_flush())
            .or_else(|| self.find_straight())
            .or_else(|| self.find_3_oak())
            .or_else(|| self.find_2_oak_2_oak())
            .or_else(|| self.find_2_oak())
            .or_else(|| self.find_1_oak())
            .expect("at least one card in Hand")
    }

    pub fn find_kickers(&self, value: Ranking) -> Kickers {
        let n = value.n_kickers();
        if n == 0 {
            return Kickers::from(0u16);
        }
        let mask = match value {
            Ranking::Flush(hi) => {
                let suit = self.find_suit_of_flush().expect("flush suit");
                self.0.of(&suit).rank_mask() & !u16::from(hi)
            }
            Ranking::TwoPair(hi, lo) => self.0.rank_mask() & !u16::from(hi) & !u16::from(lo),
            Ranking::HighCard(hi)
            | Ranking::OnePair(hi)
            | Ranking::ThreeOAK(hi)
            | Ranking::FourOAK(hi) => self.0.rank_mask() & !u16::from(hi),
            _ => unreachable!(),
        };
        let mut bits = mask;
        while bits.count_ones() as usize > n {
            bits &= !(1 << bits.trailing_zeros());
        }
        Kickers::from(bits)
    }

    ///

    fn find_1_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(1, None).map(Ranking::HighCard)
    }
    fn find_2_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(2, None).map(Ranking::OnePair)
    }
    fn find_3_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(3, None).map(Ranking::ThreeOAK)
    }
    fn find_4_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(4, None).map(Ranking::FourOAK)
    }
    fn find_2_oak_2_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(2, None).and_then(|hi| {
            self.find_rank_of_n_oak(2, Some(hi))
                .map(|lo| Ranking::TwoPair(hi, lo))
        })
    }
    fn find_3_oak_2_oak(&self) -> Option<Ranking> {
        self.find_rank_of_n_oak(3, None).and_then(|trips| {
            self.find_rank_of_n_oak(2, Some(trips))
                .map(|pairs| Ranking::FullHouse(trips, pairs))
        })
    }
    fn find_straight(&self) -> Option<Ranking> {
        Self::find_rank_of_straight(self.0.rank_mask()).map(Ranking::Straight)
    }
    fn find_flush(&self) -> Option<Ranking> {
        self.find_suit_of_flush()
            .map(|suit| Ranking::Flush(Rank::from(self.0.of(&suit).rank_mask())))
    }
    fn find_straight_flush(&self) -> Option<Ranking> {
        self.find_suit_of_flush().and_then(|suit| {
            Self::find_rank_of_straight(self.0.of(&suit).rank_mask())
                .map(Ranking::StraightFlush)
        })
    }

    ///

    fn find_rank_of_straight(ranks: u16) -> Option<Rank> {
        const WHEEL: u16 = 0b_1000000001111;
        let mut bits = ranks;
        bits &= bits << 1;
        bits &= bits << 1;
        bits &= bits << 1;
        bits &= bits << 1;
        if bits > 0 {
            Some(Rank::from(bits))
        } else if WHEEL == (WHEEL & ranks) {
            Some(Rank::Five)
        } else {
            None
        }
    }
    fn find_suit_of_flush(&self) -> Option<Suit> {
        self.0
            .suit_count()
            .iter()
            .position(|&n| n >= 5)
            .map(|i| Suit::from(i as u8))
    }
    /// highest rank strictly below the cap with at least n of a kind
    fn find_rank_of_n_oak(&self, n: u8, below: Option<Rank>) -> Option<Rank> {
        let counts = self.0.rank_count();
        let cap = below.map(|r| r as usize).unwrap_or(13);
        (0..cap)
            .rev()
            .find(|&i| counts[i] >= n)
            .map(|i| Rank::from(i as u8))
    }
}
