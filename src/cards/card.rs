use super::rank::Rank;
use super::suit::Suit;

/// a card is one of 52 (Rank, Suit) pairs,
/// encoded as rank * 4 + suit in 6 bits
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Card {
    rank: Rank,
    suit: Suit,
}

impl Card {
    pub fn rank(&self) -> Rank {
        self.rank
    }
    pub fn suit(&self) -> Suit {
        self.suit
    }
}

impl From<(Rank, Suit)> for Card {
    fn from((rank, suit): (Rank, Suit)) -> Self {
        Self { rank, suit }
    }
}

// u8 isomorphism
impl From<Card> for u8 {
    fn from(c: Card) -> u8 {
        (c.rank as u8) * 4 + (c.suit as u8)
    }
}
impl From<u8> for Card {
    fn from(n: u8) -> Self {
        assert!(n < 52);
        Self {
            rank: Rank::from(n / 4),
            suit: Suit::from(n % 4),
        }
    }
}

// u64 isomorphism
impl From<Card> for u64 {
    fn from(c: Card) -> u64 {
        1 << u8::from(c)
    }
}
impl From<u64> for Card {
    fn from(n: u64) -> Self {
        assert!(n.count_ones() == 1);
        Self::from(n.trailing_zeros() as u8)
    }
}

/// "As", "Td", "2c"
impl From<&str> for Card {
    fn from(s: &str) -> Self {
        let mut chars = s.chars();
        let rank = Rank::from(chars.next().expect("rank char"));
        let suit = match chars.next().expect("suit char") {
            'c' => Suit::C,
            'd' => Suit::D,
            'h' => Suit::H,
            's' => Suit::S,
            _ => panic!("invalid suit char"),
        };
        Self { rank, suit }
    }
}

impl std::fmt::Display for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}{}", self.rank, self.suit)
    }
}

impl crate::Arbitrary for Card {
    fn random() -> Self {
        use rand::Rng;
        Self::from(rand::thread_rng().gen_range(0..52u8))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u8_round_trip() {
        for n in 0..52u8 {
            assert_eq!(u8::from(Card::from(n)), n);
        }
    }

    #[test]
    fn str_round_trip() {
        let card = Card::from("As");
        assert_eq!(card.rank(), Rank::Ace);
        assert_eq!(card.suit(), Suit::S);
        assert_eq!(format!("{}", card), "As");
    }
}
