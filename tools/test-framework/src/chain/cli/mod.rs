/*!
   Builders and parsers for the Cosmos SDK chain command line.
*/

pub mod keys;
pub mod query;
pub mod transfer;
