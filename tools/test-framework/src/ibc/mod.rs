/*!
   Code that may belong to the [`ibc_relayer_types`] module, but are
   currently in this crate for easier review or maintenance.
*/

pub mod denom;
