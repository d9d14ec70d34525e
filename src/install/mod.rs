//! Install orchestration for P0 integration components.
//!
//! Every installable P0 resource goes through the same backend sequence:
//!
//! 1. **EnsureConfig**: create the integration container (409 is fine)
//! 2. **Stage**: PUT the item, which lands in `stage`
//! 3. **Verify** then **Configure**: POST the item to each step in order
//! 4. **Read / Rollback / Delete**: GET, re-PUT, or DELETE the item
//!
//! [`Install`] drives this for components addressed by an item id, and
//! [`RootInstall`] handles integrations that hold a single configuration
//! object. Both are generic over the resource's conversion contract
//! ([`ItemModel`] / [`RootModel`]).

mod model;
mod orchestrator;
mod root;
mod state;

pub use model::{decode, deep_merge, encode, merge_object, ItemModel, RootModel};
pub use orchestrator::{Install, InstallTarget, INSTALL_STEPS, SINGLETON_ITEM_ID};
pub use root::RootInstall;
pub use state::{InstallState, Transition};
