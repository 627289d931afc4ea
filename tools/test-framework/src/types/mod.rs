/*!
   Definitions of data types used by the test framework.
*/

pub mod config;
pub mod env;
pub mod wallet;
