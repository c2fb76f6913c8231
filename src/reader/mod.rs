//! XML Reader Module
//!
//! - BufferedReader: chunked reads from any `std::io::Read` source, keeping
//!   the unconsumed tail of a window for the next tokenizer pass

pub mod buffered;
