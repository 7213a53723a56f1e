//! The persistence gateway: topology-aware factory caching, named-operation dispatch and the
//! generic DAO built on top.

pub mod dao;
pub mod dispatcher;
pub mod entity;
pub mod factory_cache;
pub mod mapper;
pub mod session;
pub mod transaction;

pub use dao::GenericDao;
pub use dispatcher::{Dispatcher, rows_affected};
pub use entity::Entity;
pub use factory_cache::SessionFactoryCache;
pub use mapper::{ArgKind, Mapper, MapperHandle, OperationFuture, OperationRegistry, ParamShape, Params};
pub use session::{FactoryBuilder, Session, SessionFactory, SessionOf};
pub use transaction::{TransactionOutcome, TransactionState, TransactionalExecutor};
