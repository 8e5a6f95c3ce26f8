mod node;
mod serde;
pub mod symbol;
mod types;
mod value;
mod walk;

pub use node::describe_node;
pub use self::serde::{GraphDeserialize, GraphSerialize};
pub use symbol::Symbol;
pub use types::{
    AttrValue, Block, BlockId, Graph, InsertPoint, Node, NodeId, OpAttr, OpAttrs, ValueId,
};
pub use value::{Producer, ScalarType, Use, User, Value, ValueType};
pub use walk::{BlockWalk, WalkEvent};
