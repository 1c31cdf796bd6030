//! HTTP protocol module
//!
//! Response builders and content-type detection shared by the handlers.

pub mod mime;
pub mod response;

pub use response::{
    build_400_response, build_401_response, build_404_response, build_405_response,
    build_500_response, build_challenge_response, build_file_response, build_html_response,
    build_ok_text, build_options_response,
};
