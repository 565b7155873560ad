pub mod dispatch_record;

pub use dispatch_record::{
    ClaimOutcome, DeliveryResult, DispatchRecord, DispatchStore, DispatchStoreError,
    MemoryDispatchStore, PgDispatchStore,
};
