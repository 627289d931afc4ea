/*!
   Helper functions for setting up test cases in an imperative way.

   Normal test authors should have no need to call functions provided
   by the `bootstrap` module, as they are implicitly called by the
   [`framework`](crate::framework) constructs.
*/

pub mod init;
