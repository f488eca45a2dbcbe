use super::card::Card;
use super::hand::Hand;
use super::suit::Suit;

/// One of the 4! = 24 relabelings of the four suits, indexed by the
/// canonical suit order (C < D < H < S): suit s maps to self.0[s].
/// Deals related by an element of this group are strategically
/// identical, which is what hole and board canonicalization exploit.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub struct Permutation([Suit; 4]);

impl Permutation {
    pub const fn identity() -> Self {
        Self(Suit::all())
    }
    pub fn map(&self, suit: Suit) -> Suit {
        self.0[suit as usize]
    }
    /// relabel every card's suit, preserving ranks
    pub fn permute(&self, hand: &Hand) -> Hand {
        hand.cards()
            .map(|c| Card::from((c.rank(), self.map(c.suit()))))
            .map(Hand::from)
            .fold(Hand::empty(), Hand::add)
    }
    /// all 24 elements of the group
    pub fn exhaust() -> Vec<Self> {
        let mut all = Vec::with_capacity(24);
        let suits = Suit::all();
        for a in 0..4 {
            for b in 0..4 {
                for c in 0..4 {
                    for d in 0..4 {
                        if a != b && a != c && a != d && b != c && b != d && c != d {
                            all.push(Self([suits[a], suits[b], suits[c], suits[d]]));
                        }
                    }
                }
            }
        }
        all
    }
}

impl From<[Suit; 4]> for Permutation {
    fn from(suits: [Suit; 4]) -> Self {
        Self(suits)
    }
}

impl crate::Arbitrary for Permutation {
    fn random() -> Self {
        use rand::seq::SliceRandom;
        let mut suits = Suit::all();
        suits.shuffle(&mut rand::thread_rng());
        Self(suits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::hole::Hole;
    use crate::Arbitrary;
    use std::collections::HashSet;

    #[test]
    fn exhaust_covers_group() {
        let all = Permutation::exhaust();
        assert_eq!(all.len(), 24);
        assert_eq!(all.iter().collect::<HashSet<_>>().len(), 24);
        // each element is a bijection on the suits
        for permutation in all {
            let images: HashSet<Suit> = Suit::all()
                .into_iter()
                .map(|s| permutation.map(s))
                .collect();
            assert_eq!(images.len(), 4);
        }
    }

    #[test]
    fn identity_leaves_deals_alone() {
        let hole = Hand::from("Ah Kh");
        let flop = Hand::from("2c 7d Jh");
        assert_eq!(Permutation::identity().permute(&hole), hole);
        assert_eq!(Permutation::identity().permute(&flop), flop);
    }

    #[test]
    fn relabeling_preserves_ranks() {
        let runout = Hand::from("9s 9d Ts 4h 2c");
        for _ in 0..20 {
            let permutation = Permutation::random();
            let image = permutation.permute(&runout);
            assert_eq!(image.size(), runout.size());
            assert_eq!(image.rank_count(), runout.rank_count());
        }
    }

    #[test]
    fn suited_holes_stay_suited() {
        let suited = Hand::from("Qh Jh");
        let offsuit = Hand::from("Qh Js");
        for permutation in Permutation::exhaust() {
            assert_eq!(Hole::from(permutation.permute(&suited)), Hole::from(suited));
            assert_eq!(
                Hole::from(permutation.permute(&offsuit)),
                Hole::from(offsuit)
            );
        }
    }

    #[test]
    fn monotone_flop_stays_monotone() {
        let flop = Hand::from("Ac Kc Qc");
        for permutation in Permutation::exhaust() {
            let image = permutation.permute(&flop);
            let suits = image.suit_count();
            assert_eq!(suits.iter().filter(|&&n| n > 0).count(), 1);
            assert_eq!(*suits.iter().max().unwrap(), 3);
        }
    }

    #[test]
    fn four_suit_deal_has_24_images() {
        // a hole and flop touching all four suits is moved by every
        // non-identity relabeling
        let deal = Hand::from("As Kd 7h 2c");
        let images: HashSet<Hand> = Permutation::exhaust()
            .into_iter()
            .map(|p| p.permute(&deal))
            .collect();
        assert_eq!(images.len(), 24);
    }

    #[test]
    fn two_suit_hole_images_collapse() {
        // only the pair of suits matters: 4 * 3 = 12 distinct images
        let hole = Hand::from("Qh Js");
        let images: HashSet<Hand> = Permutation::exhaust()
            .into_iter()
            .map(|p| p.permute(&hole))
            .collect();
        assert_eq!(images.len(), 12);
    }
}
