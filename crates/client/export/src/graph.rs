use std::collections::{BTreeMap, BTreeSet};

use ep_record::EntityType;

use crate::ExportError;

/// An extraction job. Some jobs yield several entity types at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Producer {
    BlocksAndTransactions,
    ReceiptsAndLogs,
    TokenTransfers,
    Traces,
    GethTraces,
    Contracts,
    Tokens,
    InternalTransfers,
    TokenBalances,
    NativeBalances,
}

impl Producer {
    pub const ALL: [Producer; 10] = [
        Producer::BlocksAndTransactions,
        Producer::ReceiptsAndLogs,
        Producer::TokenTransfers,
        Producer::Traces,
        Producer::GethTraces,
        Producer::Contracts,
        Producer::Tokens,
        Producer::InternalTransfers,
        Producer::TokenBalances,
        Producer::NativeBalances,
    ];

    /// Entity types yielded by one execution. `error` records are a byproduct
    /// of several jobs and are not listed.
    pub fn outputs(&self) -> &'static [EntityType] {
        match self {
            Producer::BlocksAndTransactions => &[EntityType::Block, EntityType::Transaction],
            Producer::ReceiptsAndLogs => &[EntityType::Receipt, EntityType::Log],
            Producer::TokenTransfers => &[EntityType::TokenTransfer],
            Producer::Traces => &[EntityType::Trace],
            Producer::GethTraces => &[EntityType::GethTrace],
            Producer::Contracts => &[EntityType::Contract],
            Producer::Tokens => &[EntityType::Token],
            Producer::InternalTransfers => &[EntityType::InternalTransfer],
            Producer::TokenBalances => &[EntityType::TokenBalance],
            Producer::NativeBalances => &[EntityType::NativeBalance],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Producer::BlocksAndTransactions => "blocks_and_transactions",
            Producer::ReceiptsAndLogs => "receipts_and_logs",
            Producer::TokenTransfers => "token_transfers",
            Producer::Traces => "traces",
            Producer::GethTraces => "geth_traces",
            Producer::Contracts => "contracts",
            Producer::Tokens => "tokens",
            Producer::InternalTransfers => "internal_transfers",
            Producer::TokenBalances => "token_balances",
            Producer::NativeBalances => "native_balances",
        }
    }
}

/// Explicit adjacency list of the entity types and the job producing each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyGraph {
    dependencies: BTreeMap<EntityType, Vec<EntityType>>,
    producers: BTreeMap<EntityType, Producer>,
}

impl DependencyGraph {
    pub fn standard() -> Self {
        use EntityType::*;

        let dependencies = BTreeMap::from([
            (Block, vec![]),
            (Transaction, vec![]),
            (Receipt, vec![Transaction]),
            (Log, vec![Transaction]),
            (TokenTransfer, vec![Log, Block]),
            (Trace, vec![Block]),
            (GethTrace, vec![Transaction, Block]),
            (Contract, vec![Trace, Block]),
            (Token, vec![Contract]),
            (InternalTransfer, vec![Trace, Block]),
            (TokenBalance, vec![TokenTransfer]),
            (NativeBalance, vec![Transaction, Block]),
            (Error, vec![]),
        ]);
        let producers =
            Producer::ALL.into_iter().flat_map(|p| p.outputs().iter().map(move |t| (*t, p))).collect();

        Self { dependencies, producers }
    }

    /// Adds an edge. Used to build invalid graphs in tests.
    pub fn with_dependency(mut self, kind: EntityType, dependency: EntityType) -> Self {
        self.dependencies.entry(kind).or_default().push(dependency);
        self
    }

    /// Removes the producer of `kind`. Used to build incomplete graphs in tests.
    pub fn without_producer(mut self, kind: EntityType) -> Self {
        self.producers.remove(&kind);
        self
    }

    pub fn dependencies(&self, kind: EntityType) -> &[EntityType] {
        self.dependencies.get(&kind).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn producer(&self, kind: EntityType) -> Option<Producer> {
        self.producers.get(&kind).copied()
    }

    /// Types a producer needs before it can run: the dependencies of its
    /// outputs, minus the outputs themselves.
    pub fn inputs(&self, producer: Producer) -> Vec<EntityType> {
        let outputs = producer.outputs();
        let inputs: BTreeSet<EntityType> = outputs
            .iter()
            .flat_map(|t| self.dependencies(*t).iter().copied())
            .filter(|t| !outputs.contains(t))
            .collect();
        inputs.into_iter().collect()
    }

    /// Fails on the first type found on a dependency cycle.
    pub fn validate(&self) -> Result<(), ExportError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit(
            graph: &DependencyGraph,
            kind: EntityType,
            marks: &mut BTreeMap<EntityType, Mark>,
        ) -> Result<(), ExportError> {
            match marks.get(&kind) {
                Some(Mark::Done) => return Ok(()),
                Some(Mark::Visiting) => return Err(ExportError::Cycle(kind)),
                None => {}
            }
            marks.insert(kind, Mark::Visiting);
            for dep in graph.dependencies(kind) {
                visit(graph, *dep, marks)?;
            }
            marks.insert(kind, Mark::Done);
            Ok(())
        }

        let mut marks = BTreeMap::new();
        for kind in self.dependencies.keys() {
            visit(self, *kind, &mut marks)?;
        }
        Ok(())
    }

    /// Requested types plus everything they transitively depend on. `error`
    /// never triggers extraction and is left out.
    pub fn closure(&self, requested: &[EntityType]) -> BTreeSet<EntityType> {
        let mut reachable = BTreeSet::new();
        let mut stack: Vec<EntityType> = requested.iter().copied().filter(|t| *t != EntityType::Error).collect();
        while let Some(kind) = stack.pop() {
            if reachable.insert(kind) {
                stack.extend(self.dependencies(kind).iter().copied().filter(|t| !reachable.contains(t)));
            }
        }
        reachable
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::standard()
    }
}
