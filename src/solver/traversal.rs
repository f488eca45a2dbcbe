use super::infoset::InfoKey;
use super::policy;
use super::sampling::Sampler;
use super::store::InfoSetStore;
use super::store::UpdateRule;
use crate::cards::board::Board;
use crate::cards::hand::Hand;
use crate::cards::hand::HandIterator;
use crate::cards::strength::Strength;
use crate::config::IterConfig;
use crate::error::SolverError;
use crate::tree::node::Edge;
use crate::tree::node::GameNode;
use crate::tree::node::NodeIndex;
use crate::tree::node::NodeKind;
use crate::tree::node::TerminalKind;
use crate::tree::tree::GameTree;
use crate::Utility;
use crate::REACH_EPSILON;
use rand::rngs::SmallRng;
use rand::Rng;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

/// One traversal's worth of cards: both seats' hole cards plus a
/// predetermined runout consumed only when a line terminates before
/// the board is complete (preflop-only showdown placeholders).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deal {
    pub holes: [Hand; 2],
    pub runout: Hand,
}

impl Deal {
    pub fn random(rng: &mut SmallRng) -> Self {
        let mut used = Hand::empty();
        let mut draw = |n: usize, used: &mut Hand| {
            let mut hand = Hand::empty();
            while hand.size() < n {
                let card = Hand::from(1u64 << rng.gen_range(0..52));
                if u64::from(*used) & u64::from(card) == 0 {
                    *used = Hand::add(*used, card);
                    hand = Hand::add(hand, card);
                }
            }
            hand
        };
        let first = draw(2, &mut used);
        let second = draw(2, &mut used);
        let runout = draw(5, &mut used);
        Self {
            holes: [first, second],
            runout,
        }
    }

    /// cards not available to chance reveals
    pub fn used(&self) -> Hand {
        Hand::add(self.holes[0], self.holes[1])
    }
}

/// per-node visit counts, shared across workers; feeds the
/// frequency pruning strategy and throughput stats
pub struct VisitCounters {
    counts: Vec<AtomicU64>,
}

impl VisitCounters {
    pub fn new(nodes: usize) -> Self {
        Self {
            counts: (0..nodes).map(|_| AtomicU64::new(0)).collect(),
        }
    }
    pub fn record(&self, node: NodeIndex) {
        self.counts[node as usize].fetch_add(1, Ordering::Relaxed);
    }
    pub fn get(&self, node: NodeIndex) -> u64 {
        self.counts[node as usize].load(Ordering::Relaxed)
    }
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }
    pub fn snapshot(&self) -> Vec<u64> {
        self.counts
            .iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect()
    }
}

/// Recursive counterfactual-value computation over the betting tree
/// for a single deal. Thread-safe against a shared store: every
/// record mutation goes through the store's shard locks, and the
/// tree is only ever read.
pub struct Traverser<'a> {
    tree: &'a GameTree,
    store: &'a InfoSetStore,
    config: &'a IterConfig,
    sampler: Sampler,
    iteration: u64,
    visits: Option<&'a VisitCounters>,
}

impl<'a> Traverser<'a> {
    pub fn new(
        tree: &'a GameTree,
        store: &'a InfoSetStore,
        config: &'a IterConfig,
        iteration: u64,
    ) -> Self {
        let sampler = if config.use_sampling {
            Sampler::new(config.sampling_strategy, config.sampling_probability)
        } else {
            Sampler::exhaustive()
        };
        Self {
            tree,
            store,
            config,
            sampler,
            iteration,
            visits: None,
        }
    }

    pub fn counting(mut self, visits: &'a VisitCounters) -> Self {
        self.visits = Some(visits);
        self
    }

    /// run one full traversal; returns the root value per seat
    pub fn run(&self, deal: &Deal, rng: &mut SmallRng) -> Result<[Utility; 2], SolverError> {
        self.cfr(self.tree.root().id, deal, Board::empty(), [1.0, 1.0], rng)
    }

    /// Node values travel as one utility per seat. With no rake the
    /// pair is zero-sum; with rake both seats can lose at once, so
    /// neither seat's value is derivable from the other's.
    fn cfr(
        &self,
        at: NodeIndex,
        deal: &Deal,
        board: Board,
        reach: [f64; 2],
        rng: &mut SmallRng,
    ) -> Result<[Utility; 2], SolverError> {
        let node = self.tree.at(at);
        if let Some(visits) = self.visits {
            visits.record(at);
        }
        match node.kind {
            NodeKind::Terminal(kind) => self.terminal(node, kind, deal, board),
            NodeKind::Chance => self.chance(node, deal, board, reach, rng),
            NodeKind::Player(seat) => self.decision(node, seat, deal, board, reach, rng),
        }
    }

    /// average over (sampled) reveals with equal importance weights
    fn chance(
        &self,
        node: &GameNode,
        deal: &Deal,
        board: Board,
        reach: [f64; 2],
        rng: &mut SmallRng,
    ) -> Result<[Utility; 2], SolverError> {
        let (edge, child) = node.children[0];
        debug_assert!(edge == Edge::Reveal);
        let blocked = Hand::add(deal.used(), board.as_hand());
        let reveals: Vec<Hand> =
            HandIterator::new(node.street.n_revealed(), blocked).collect();
        let chosen = self.sampler.select(reveals.len(), rng);
        let k = chosen.len() as f64;
        let mut value = [0.0; 2];
        for index in chosen {
            let v = self.cfr(child, deal, board.deal(reveals[index]), reach, rng)?;
            value[0] += v[0];
            value[1] += v[1];
        }
        Ok([value[0] / k, value[1] / k])
    }

    fn decision(
        &self,
        node: &GameNode,
        seat: u8,
        deal: &Deal,
        board: Board,
        reach: [f64; 2],
        rng: &mut SmallRng,
    ) -> Result<[Utility; 2], SolverError> {
        let actor = seat as usize;
        let other = 1 - actor;
        let key = InfoKey::from_node(node, deal.holes[actor], &board, self.tree.params());
        let n = node.num_actions();
        let handle = self.store.get_or_create_cached(key, n);
        let regrets = self.store.read_regrets(&handle);
        let sigma = policy::regret_matching(&regrets, self.config.prune_threshold);
        let mut values = vec![[0.0; 2]; n];
        for (i, (_, child)) in node.children.iter().enumerate() {
            // a pruned action still matters to counterfactual values
            // whenever the opponent could have reached us
            if sigma[i] == 0.0 && reach[other] < REACH_EPSILON {
                continue;
            }
            let mut forward = reach;
            forward[actor] *= sigma[i];
            values[i] = self.cfr(*child, deal, board, forward, rng)?;
        }
        let mut value = [0.0; 2];
        for (s, v) in sigma.iter().zip(values.iter()) {
            value[0] += s * v[0];
            value[1] += s * v[1];
        }
        if reach[other] >= REACH_EPSILON {
            let weight = self.regret_weight();
            let deltas: Vec<f64> = values
                .iter()
                .map(|v| weight * reach[other] * (v[actor] - value[actor]))
                .collect();
            let rule = if self.config.use_cfr_plus {
                UpdateRule::CfrPlus
            } else {
                UpdateRule::Vanilla
            };
            self.store
                .update_regrets(&handle, &deltas, self.iteration, rule)?;
        }
        if reach[actor] >= REACH_EPSILON {
            self.store
                .update_strategy_sum(&handle, &sigma, reach[actor] * self.linear_weight())?;
        }
        Ok(value)
    }

    /// Each seat's true economic outcome. The loser always forfeits
    /// its investment; rake comes out of the winner's take, and a
    /// split charges half the rake to each seat.
    fn terminal(
        &self,
        node: &GameNode,
        kind: TerminalKind,
        deal: &Deal,
        board: Board,
    ) -> Result<[Utility; 2], SolverError> {
        let params = self.tree.params();
        match kind {
            TerminalKind::Fold => {
                let folder = self
                    .tree
                    .at(node.parent.expect("terminal has parent"))
                    .seat()
                    .expect("folder acted") as usize;
                let lost = node.invested[folder] as Utility;
                let mut utility = [0.0; 2];
                utility[folder] = -lost;
                utility[folder ^ 1] = (lost - params.rake()).max(0.0);
                Ok(utility)
            }
            TerminalKind::Showdown => {
                debug_assert!(node.invested[0] == node.invested[1]);
                let invested = node.invested[0] as Utility;
                let community = self.community(deal, board);
                let s0 = Strength::seven(Hand::add(deal.holes[0], community))
                    .ok_or_else(|| SolverError::TreeShape("malformed showdown hand".into()))?;
                let s1 = Strength::seven(Hand::add(deal.holes[1], community))
                    .ok_or_else(|| SolverError::TreeShape("malformed showdown hand".into()))?;
                let rake = params.rake();
                let take = (invested - rake).max(0.0);
                Ok(match s0.cmp(&s1) {
                    std::cmp::Ordering::Greater => [take, -invested],
                    std::cmp::Ordering::Less => [-invested, take],
                    std::cmp::Ordering::Equal => [-rake / 2.0, -rake / 2.0],
                })
            }
        }
    }

    /// fill the board out to five cards from the predetermined runout
    fn community(&self, deal: &Deal, board: Board) -> Hand {
        let dealt = board.as_hand();
        if dealt.size() == 5 {
            return dealt;
        }
        let mut community = dealt;
        for card in deal.runout.cards() {
            if community.size() == 5 {
                break;
            }
            if !community.contains(&card) {
                community = Hand::add(community, Hand::from(card));
            }
        }
        community
    }

    fn regret_weight(&self) -> f64 {
        let linear = self.linear_weight();
        linear * self.config.discount_factor
    }

    fn linear_weight(&self) -> f64 {
        if self.config.use_linear_weighting {
            self.iteration.max(1) as f64
        } else {
            1.0
        }
    }
}
