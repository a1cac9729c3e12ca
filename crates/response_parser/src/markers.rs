//! Literal markers the prompts ask the model to wrap payloads in.

pub const FIX_BEGIN: &str = "!!!!fix_begin!!!!";
pub const FIX_BEGIN_LINE: &str = "!!!!fix_begin!!!!\n";
pub const FIX_END: &str = "!!!!fix_end!!!!";

pub const TEST_BEGIN: &str = "!!!!test_file_begin!!!!";
pub const TEST_BEGIN_LINE: &str = "!!!!test_file_begin!!!!\n";
pub const TEST_END: &str = "!!!!test_file_end!!!!";

/// Begin and end marker of one kind of payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub begin: &'static str,
    pub begin_line: &'static str,
    pub end: &'static str,
}

pub const FIX_MARKERS: Markers = Markers {
    begin: FIX_BEGIN,
    begin_line: FIX_BEGIN_LINE,
    end: FIX_END,
};

pub const TEST_MARKERS: Markers = Markers {
    begin: TEST_BEGIN,
    begin_line: TEST_BEGIN_LINE,
    end: TEST_END,
};
