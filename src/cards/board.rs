use super::card::Card;
use super::hand::Hand;

/// Community cards in deal order. The flop is an unordered set but
/// the turn and river keep their identity, which the street-impact
/// classification depends on.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    flop: Hand,
    turn: Option<Card>,
    river: Option<Card>,
}

impl Board {
    pub const fn empty() -> Self {
        Self {
            flop: Hand::empty(),
            turn: None,
            river: None,
        }
    }
    pub fn flop(&self) -> Hand {
        self.flop
    }
    pub fn turn(&self) -> Option<Card> {
        self.turn
    }
    pub fn river(&self) -> Option<Card> {
        self.river
    }
    pub fn size(&self) -> usize {
        self.flop.size() + self.turn.is_some() as usize + self.river.is_some() as usize
    }
    /// all dealt cards as a set
    pub fn as_hand(&self) -> Hand {
        let mut hand = self.flop;
        if let Some(turn) = self.turn {
            hand = Hand::add(hand, Hand::from(turn));
        }
        if let Some(river) = self.river {
            hand = Hand::add(hand, Hand::from(river));
        }
        hand
    }
    /// extend with the next street's reveal
    pub fn deal(&self, reveal: Hand) -> Self {
        let mut next = *self;
        match (self.flop.size(), self.turn, self.river) {
            (0, _, _) => {
                assert!(reveal.size() == 3);
                next.flop = reveal;
            }
            (3, None, _) => {
                assert!(reveal.size() == 1);
                next.turn = reveal.cards().next();
            }
            (3, Some(_), None) => {
                assert!(reveal.size() == 1);
                next.river = reveal.cards().next();
            }
            _ => panic!("board already complete"),
        }
        next
    }
}

impl std::fmt::Display for Board {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.flop)?;
        if let Some(turn) = self.turn {
            write!(f, "{} ", turn)?;
        }
        if let Some(river) = self.river {
            write!(f, "{} ", river)?;
        }
        Ok(())
    }
}
