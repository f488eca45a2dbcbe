use super::action::Action;
use super::node::Edge;
use super::node::GameNode;
use super::node::NodeIndex;
use super::node::NodeKind;
use super::node::TerminalKind;
use super::path::Path;
use super::street::Street;
use crate::config::GameParams;
use crate::error::SolverError;
use crate::Chips;

/// builder state for one point of the betting sequence
#[derive(Clone, Copy)]
struct Frame {
    street: Street,
    raises: u8,
    facing_bet: bool,
    to_act: u8,
    invested: [Chips; 2],
    history: Path,
    /// decisions taken since the street opened; distinguishes a
    /// first check from a street-closing second check
    street_actions: u8,
}

/// The extensive-form HU-LHE betting tree: a flat arena of nodes,
/// immutable during solving. Construction is total and deterministic
/// for valid parameters, so identical parameters always produce
/// identical node indices.
pub struct GameTree {
    nodes: Vec<GameNode>,
    params: GameParams,
}

impl GameTree {
    pub fn build(params: GameParams) -> Result<Self, SolverError> {
        params.validate()?;
        let streets: Chips = if params.preflop_only { 1 } else { 6 };
        let worst_case = params.big_blind
            + params.big_blind * params.max_raises_per_street as Chips * streets;
        if params.stack < worst_case {
            return Err(SolverError::ConfigInvalid(format!(
                "stack {} cannot cover the {} chips a capped line commits",
                params.stack, worst_case
            )));
        }
        let mut tree = Self {
            nodes: Vec::new(),
            params,
        };
        let root = Frame {
            street: Street::Pre,
            raises: 0,
            facing_bet: true, // the big blind is a standing bet
            to_act: Street::Pre.first_to_act(),
            invested: [tree.params.small_blind, tree.params.big_blind],
            history: Path::empty(),
            street_actions: 0,
        };
        tree.grow(root, None)?;
        log::debug!(
            "built tree: {} nodes, {} player, {} terminal",
            tree.nodes.len(),
            tree.player_nodes().count(),
            tree.nodes.iter().filter(|n| n.is_terminal()).count(),
        );
        Ok(tree)
    }

    pub fn params(&self) -> &GameParams {
        &self.params
    }
    pub fn root(&self) -> &GameNode {
        &self.nodes[0]
    }
    pub fn at(&self, index: NodeIndex) -> &GameNode {
        &self.nodes[index as usize]
    }
    pub fn len(&self) -> usize {
        self.nodes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &GameNode> {
        self.nodes.iter()
    }
    pub fn player_nodes(&self) -> impl Iterator<Item = &GameNode> {
        self.nodes.iter().filter(|n| n.is_player())
    }

    /// allocate a node and return its index
    fn alloc(&mut self, node: GameNode) -> NodeIndex {
        let index = node.id;
        self.nodes.push(node);
        index
    }

    fn next_id(&self) -> NodeIndex {
        self.nodes.len() as NodeIndex
    }

    /// recursively expand the betting sequence at `frame`
    fn grow(&mut self, frame: Frame, parent: Option<NodeIndex>) -> Result<NodeIndex, SolverError> {
        let id = self.alloc(GameNode {
            id: self.next_id(),
            parent,
            kind: NodeKind::Player(frame.to_act),
            street: frame.street,
            raises: frame.raises,
            facing_bet: frame.facing_bet,
            invested: frame.invested,
            history: frame.history,
            children: Vec::new(),
        });
        for action in Action::all() {
            if self.legal(&frame, action) {
                let child = self.apply(frame, action, id)?;
                self.attach(id, Edge::Choice(action), child)?;
            }
        }
        Ok(id)
    }

    fn legal(&self, frame: &Frame, action: Action) -> bool {
        match action {
            Action::Fold => frame.facing_bet,
            Action::Call => true,
            Action::Raise => frame.raises < self.params.max_raises_per_street,
        }
    }

    /// create the subtree reached by taking `action` from `frame`
    fn apply(
        &mut self,
        frame: Frame,
        action: Action,
        parent: NodeIndex,
    ) -> Result<NodeIndex, SolverError> {
        let actor = frame.to_act as usize;
        let other = 1 - actor;
        let history = frame.history.push(action);
        match action {
            Action::Fold => Ok(self.alloc(GameNode {
                id: self.next_id(),
                parent: Some(parent),
                kind: NodeKind::Terminal(TerminalKind::Fold),
                street: frame.street,
                raises: frame.raises,
                facing_bet: frame.facing_bet,
                invested: frame.invested,
                history,
                children: Vec::new(),
            })),
            Action::Call => {
                let mut invested = frame.invested;
                invested[actor] = invested[other];
                let closes = frame.facing_bet || frame.street_actions > 0;
                if !closes {
                    // first check of the street; opponent gets the option
                    self.grow(
                        Frame {
                            to_act: frame.to_act ^ 1,
                            invested,
                            history,
                            street_actions: frame.street_actions + 1,
                            ..frame
                        },
                        Some(parent),
                    )
                } else if frame.street == Street::River || self.params.preflop_only {
                    Ok(self.alloc(GameNode {
                        id: self.next_id(),
                        parent: Some(parent),
                        kind: NodeKind::Terminal(TerminalKind::Showdown),
                        street: frame.street,
                        raises: frame.raises,
                        facing_bet: false,
                        invested,
                        history,
                        children: Vec::new(),
                    }))
                } else {
                    self.deal(frame, invested, history, parent)
                }
            }
            Action::Raise => {
                let mut invested = frame.invested;
                invested[actor] = invested[other] + self.params.bet_size(frame.street);
                self.grow(
                    Frame {
                        raises: frame.raises + 1,
                        facing_bet: true,
                        to_act: frame.to_act ^ 1,
                        invested,
                        history,
                        street_actions: frame.street_actions + 1,
                        ..frame
                    },
                    Some(parent),
                )
            }
        }
    }

    /// insert the chance node that reveals the next street's cards
    fn deal(
        &mut self,
        frame: Frame,
        invested: [Chips; 2],
        history: Path,
        parent: NodeIndex,
    ) -> Result<NodeIndex, SolverError> {
        let street = frame.street.next();
        let chance = self.alloc(GameNode {
            id: self.next_id(),
            parent: Some(parent),
            kind: NodeKind::Chance,
            street,
            raises: 0,
            facing_bet: false,
            invested,
            history,
            children: Vec::new(),
        });
        let child = self.grow(
            Frame {
                street,
                raises: 0,
                facing_bet: false,
                to_act: street.first_to_act(),
                invested,
                history,
                street_actions: 0,
            },
            Some(chance),
        )?;
        self.attach(chance, Edge::Reveal, child)?;
        Ok(chance)
    }

    fn attach(&mut self, parent: NodeIndex, edge: Edge, child: NodeIndex) -> Result<(), SolverError> {
        let node = &mut self.nodes[parent as usize];
        if node.children.iter().any(|(e, _)| *e == edge) {
            return Err(SolverError::TreeShape(format!(
                "duplicate edge {:?} at node {}",
                edge, parent
            )));
        }
        node.children.push((edge, child));
        Ok(())
    }

    /// Drop every node not marked kept, preserving the root and all
    /// ancestors of kept nodes, and re-index the survivors. Returns
    /// the number of nodes removed. Only sound between iterations.
    pub fn compact(&mut self, keep: &[bool]) -> usize {
        assert!(keep.len() == self.nodes.len());
        let mut kept = vec![false; self.nodes.len()];
        for (index, &flag) in keep.iter().enumerate() {
            if flag {
                // retain the whole ancestor chain
                let mut cursor = Some(index as NodeIndex);
                while let Some(at) = cursor {
                    if kept[at as usize] {
                        break;
                    }
                    kept[at as usize] = true;
                    cursor = self.nodes[at as usize].parent;
                }
            }
        }
        kept[0] = true;
        let mut remap = vec![NodeIndex::MAX; self.nodes.len()];
        let mut next = 0;
        for (index, &flag) in kept.iter().enumerate() {
            if flag {
                remap[index] = next;
                next += 1;
            }
        }
        let before = self.nodes.len();
        let mut nodes = std::mem::take(&mut self.nodes);
        nodes.retain(|n| kept[n.id as usize]);
        for node in nodes.iter_mut() {
            node.id = remap[node.id as usize];
            node.parent = node.parent.map(|p| remap[p as usize]);
            node.children.retain(|(_, c)| kept[*c as usize]);
            for (_, child) in node.children.iter_mut() {
                *child = remap[*child as usize];
            }
        }
        self.nodes = nodes;
        before - self.nodes.len()
    }
}
