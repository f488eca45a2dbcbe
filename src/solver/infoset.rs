use crate::cards::board::Board;
use crate::cards::hand::Hand;
use crate::cards::hole::Hole;
use crate::cards::texture::BoardFeatures;
use crate::cards::texture::Transition;
use crate::config::GameParams;
use crate::tree::node::GameNode;
use crate::tree::path::Path;
use crate::tree::street::Street;

/// Identifies an information set: the acting seat, the street, the
/// betting history, and the canonical card components. Two game paths
/// that agree on all of these share one record; perfect recall is
/// preserved because the full history is part of the key.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct InfoKey {
    pub seat: u8,
    pub street: Street,
    pub history: Path,
    /// canonical hole encoding for the acting seat
    pub hole: u16,
    /// canonical board pattern; zero before the flop
    pub board: u32,
    /// turn/river impact classes, biased by one; zero when undealt
    pub texture: u16,
}

impl InfoKey {
    /// fold the card components into the base key of a player node.
    /// `board` holds exactly the cards visible on the node's street.
    pub fn from_node(node: &GameNode, hole: Hand, board: &Board, params: &GameParams) -> Self {
        let (seat, street, history) = node.base_key().expect("player node");
        assert!(board.size() == street.n_board());
        Self {
            seat,
            street,
            history,
            hole: Self::encode_hole(hole, params),
            board: Self::encode_board(board, street, params),
            texture: Self::encode_texture(board, street, params),
        }
    }

    fn encode_hole(hole: Hand, params: &GameParams) -> u16 {
        if params.use_suit_isomorphism {
            u16::from(Hole::from(hole))
        } else {
            let mut cards = hole.cards();
            let a = cards.next().expect("first hole card");
            let b = cards.next().expect("second hole card");
            (u8::from(a) as u16) << 8 | u8::from(b) as u16 | 0x8000
        }
    }

    fn encode_board(board: &Board, street: Street, params: &GameParams) -> u32 {
        if street == Street::Pre {
            return 0;
        }
        if params.use_suit_isomorphism {
            let pattern = BoardFeatures::from(board.as_hand()).canonical_pattern;
            if params.use_card_abstraction {
                pattern % params.abstraction_buckets.max(1)
            } else {
                pattern
            }
        } else {
            let bits = u64::from(board.as_hand());
            (bits ^ bits >> 32) as u32
        }
    }

    fn encode_texture(board: &Board, street: Street, params: &GameParams) -> u16 {
        if !params.use_card_abstraction || street < Street::Turn {
            return 0;
        }
        let turn = board.turn().expect("turn card");
        let mut packed = (u8::from(Transition::turn(board.flop(), turn)) + 1) as u16;
        if street == Street::River {
            let first4 = Hand::add(board.flop(), Hand::from(turn));
            let river = board.river().expect("river card");
            packed |= ((u8::from(Transition::river(first4, river)) + 1) as u16) << 8;
        }
        packed
    }
}

impl std::fmt::Display for InfoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{:04x}:{:08x}:{:04x}",
            self.seat, self.street, self.history, self.hole, self.board, self.texture
        )
    }
}

impl crate::Arbitrary for InfoKey {
    fn random() -> Self {
        use crate::tree::action::Action;
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let mut history = Path::empty();
        for _ in 0..rng.gen_range(0..8) {
            history = history.push(Action::from(rng.gen_range(0..3u8)));
        }
        Self {
            seat: rng.gen_range(0..2),
            street: Street::from(rng.gen_range(0..4u8)),
            history,
            hole: rng.gen(),
            board: rng.gen(),
            texture: rng.gen(),
        }
    }
}

/// The mutable learning state attached to one information set.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoSet {
    pub id: u64,
    pub regrets: Vec<f64>,
    pub strategy_sum: Vec<f64>,
    pub last_iteration: u64,
}

impl InfoSet {
    pub fn new(id: u64, num_actions: usize) -> Self {
        Self {
            id,
            regrets: vec![0.0; num_actions],
            strategy_sum: vec![0.0; num_actions],
            last_iteration: 0,
        }
    }
    pub fn num_actions(&self) -> usize {
        self.regrets.len()
    }
    /// rough heap footprint, for memory accounting
    pub fn bytes(&self) -> usize {
        std::mem::size_of::<Self>() + 16 * self.num_actions()
    }
}

impl crate::Arbitrary for InfoSet {
    fn random() -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let n = rng.gen_range(2..4);
        Self {
            id: rng.gen(),
            regrets: (0..n).map(|_| rng.gen_range(-10.0..10.0)).collect(),
            strategy_sum: (0..n).map(|_| rng.gen_range(0.0..10.0)).collect(),
            last_iteration: rng.gen_range(0..1000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::permutation::Permutation;

    fn sample_tree() -> crate::tree::tree::GameTree {
        crate::tree::tree::GameTree::build(GameParams::default()).unwrap()
    }

    #[test]
    fn isomorphic_holes_share_keys() {
        let tree = sample_tree();
        let node = tree.root();
        let params = tree.params();
        let spades = InfoKey::from_node(node, Hand::from("As Ks"), &Board::empty(), params);
        let hearts = InfoKey::from_node(node, Hand::from("Ah Kh"), &Board::empty(), params);
        assert_eq!(spades, hearts);
    }

    #[test]
    fn isomorphic_boards_share_keys() {
        let tree = sample_tree();
        let params = tree.params();
        let node = tree
            .iter()
            .find(|n| n.is_player() && n.street == Street::Flop)
            .expect("flop node");
        let flop = Hand::from("2c 7d Jh");
        let hole = Hand::from("As Ks");
        let base = InfoKey::from_node(node, hole, &Board::empty().deal(flop), params);
        for permutation in Permutation::exhaust() {
            let key = InfoKey::from_node(
                node,
                permutation.permute(&hole),
                &Board::empty().deal(permutation.permute(&flop)),
                params,
            );
            assert_eq!(key, base);
        }
    }

    #[test]
    fn distinct_seats_distinct_keys() {
        let tree = sample_tree();
        let params = tree.params();
        let root = tree.root();
        let reply = tree.at(root.follow(crate::tree::action::Action::Raise).unwrap());
        let hole = Hand::from("As Ks");
        let a = InfoKey::from_node(root, hole, &Board::empty(), params);
        let b = InfoKey::from_node(reply, hole, &Board::empty(), params);
        assert_ne!(a, b);
    }

    #[test]
    fn raw_mode_distinguishes_suits() {
        let tree = sample_tree();
        let params = GameParams {
            use_suit_isomorphism: false,
            ..tree.params().clone()
        };
        let node = tree.root();
        let spades = InfoKey::from_node(node, Hand::from("As Ks"), &Board::empty(), &params);
        let hearts = InfoKey::from_node(node, Hand::from("Ah Kh"), &Board::empty(), &params);
        assert_ne!(spades, hearts);
    }
}
