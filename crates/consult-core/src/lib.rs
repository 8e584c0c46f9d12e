pub mod assignment;
pub mod consult;
pub mod error;
pub mod events;
pub mod ids;
pub mod member;
pub mod policy;
pub mod roster;
pub mod sla;
