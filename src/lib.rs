//! Compiles FHIR turtle-notation element definitions into a relational
//! schema graph, then into table, foreign-key and relationship descriptors.
//!
//! Pipeline: [`row`] → [`field`] → [`node`] → [`graph`] → [`emit`]; the
//! [`source`] and [`render`] modules do the file I/O on either end.

pub mod emit;
pub mod error;
pub mod field;
pub mod graph;
pub mod naming;
pub mod node;
pub mod render;
pub mod row;
pub mod source;

pub use emit::{SchemaDescriptors, build_descriptors};
pub use error::{Result, SchemaError};
pub use graph::{BuildPhase, Edge, EdgeKey, Graph, GraphBuilder};
pub use node::{Node, NodeKind};

use node::nodes_from_block;
use row::RowParser;

/// Parse every text block and build the resolved graph.
pub fn build_graph<B, S>(blocks: impl IntoIterator<Item = B>) -> Result<Graph>
where
    B: AsRef<[S]>,
    S: AsRef<str>,
{
    let parser = RowParser::new()?;
    let mut builder = GraphBuilder::new();
    for block in blocks {
        builder.add_parsed_nodes(nodes_from_block(&parser, block.as_ref())?)?;
    }
    tracing::info!(nodes = builder.len(), "parsed entities");
    builder.build()
}
