/*!
   Utility functions for the test framework.
*/

pub mod assert;
pub mod mutex;
pub mod random;
pub mod retry;
pub mod suspend;
