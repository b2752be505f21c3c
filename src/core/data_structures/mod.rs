/*!
 * Data Structures
 * Small-footprint helpers shared by the gateway
 */

mod inline_string;

pub use inline_string::InlineString;
