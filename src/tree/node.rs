use super::action::Action;
use super::path::Path;
use super::street::Street;
use crate::Chips;

pub type NodeIndex = u32;

/// why a line of play ended
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum TerminalKind {
    Fold,
    Showdown,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum NodeKind {
    Player(u8),
    Chance,
    Terminal(TerminalKind),
}

/// An edge out of a node: either a betting decision or the reveal
/// of board cards at a street boundary. Choices order canonically
/// Fold < Call < Raise, with Reveal after all choices.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum Edge {
    Choice(Action),
    Reveal,
}

/// A node of the extensive-form betting tree. Nodes live in a flat
/// arena owned by the tree; children are ordered (Edge, index) pairs.
/// Card identities never appear here; they are folded into infoset
/// keys at traversal time.
#[derive(Debug, Clone)]
pub struct GameNode {
    pub id: NodeIndex,
    pub parent: Option<NodeIndex>,
    pub kind: NodeKind,
    pub street: Street,
    pub raises: u8,
    pub facing_bet: bool,
    /// chips committed by each seat on entry to this node
    pub invested: [Chips; 2],
    /// betting decisions from the root; reveals are not recorded,
    /// so the length equals the node's decision depth
    pub history: Path,
    pub children: Vec<(Edge, NodeIndex)>,
}

impl GameNode {
    pub fn pot(&self) -> Chips {
        self.invested[0] + self.invested[1]
    }
    pub fn seat(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Player(seat) => Some(seat),
            _ => None,
        }
    }
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Terminal(_))
    }
    pub fn is_player(&self) -> bool {
        matches!(self.kind, NodeKind::Player(_))
    }
    pub fn is_chance(&self) -> bool {
        matches!(self.kind, NodeKind::Chance)
    }
    pub fn num_actions(&self) -> usize {
        self.children
            .iter()
            .filter(|(e, _)| matches!(e, Edge::Choice(_)))
            .count()
    }
    /// ordered betting decisions available here
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.children.iter().filter_map(|(e, _)| match e {
            Edge::Choice(a) => Some(*a),
            Edge::Reveal => None,
        })
    }
    pub fn follow(&self, action: Action) -> Option<NodeIndex> {
        self.children
            .iter()
            .find(|(e, _)| *e == Edge::Choice(action))
            .map(|(_, i)| *i)
    }
    /// identifies (seat, street, history) for infoset keying;
    /// canonical cards are appended by the traversal
    pub fn base_key(&self) -> Option<(u8, Street, Path)> {
        self.seat().map(|seat| (seat, self.street, self.history))
    }
}
