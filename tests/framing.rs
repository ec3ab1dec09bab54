//! Frame splitter behaviour over a realistic message stream

mod helper;

use rstest::rstest;
use serde_json::json;

use helper::{ScriptedInput, create_did_open_notification, create_initialize_request, frame};
use verilog_lsp::lsp::{FramingError, MessageStreamSplitter};

fn stream() -> Vec<u8> {
    [
        create_initialize_request(1),
        create_did_open_notification("file:///a.sv", "module m;\n  // ünïcödé ✓\nendmodule\n"),
        json!({"jsonrpc": "2.0", "id": 2, "method": "shutdown"}),
    ]
    .iter()
    .flat_map(frame)
    .collect()
}

fn split(input: &mut ScriptedInput) -> (Vec<Vec<u8>>, FramingError) {
    let mut splitter = MessageStreamSplitter::default();
    let mut bodies = Vec::new();
    loop {
        if let Err(err) = splitter.pull_from(input, |frame| bodies.push(frame.body.to_vec())) {
            return (bodies, err);
        }
    }
}

#[test]
fn every_two_way_split_yields_same_frames() {
    let data = stream();
    let (expected, _) = split(&mut ScriptedInput::new(vec![data.clone()]));
    assert_eq!(expected.len(), 3);

    for cut in 1..data.len() {
        let (head, tail) = data.split_at(cut);
        let (bodies, err) = split(&mut ScriptedInput::new(vec![head.to_vec(), tail.to_vec()]));

        assert_eq!(bodies, expected, "split at byte {}", cut);
        assert!(matches!(err, FramingError::EndOfStream));
    }
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(16)]
#[case(257)]
fn fixed_size_chunks_yield_same_frames(#[case] size: usize) {
    let data = stream();
    let (expected, _) = split(&mut ScriptedInput::new(vec![data.clone()]));

    let chunks = data.chunks(size).map(<[u8]>::to_vec).collect();
    let (bodies, _) = split(&mut ScriptedInput::new(chunks));

    assert_eq!(bodies, expected);
}

#[test]
fn truncated_stream_never_dispatches_partial_frame() {
    let mut data = stream();
    data.truncate(data.len() - 1);

    let (bodies, err) = split(&mut ScriptedInput::new(vec![data]));

    assert_eq!(bodies.len(), 2);
    assert!(matches!(err, FramingError::EndOfStream));
}
