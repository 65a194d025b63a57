//! ERP write operations
//!
//! Every create/update the sync jobs perform is expressed as an [`Operation`]
//! and executed by the ERP client, producing an [`OperationResult`].

pub mod operation;

pub use operation::{Operation, OperationResult};
