mod common;

use bytes::Bytes;
use ignix_client::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn decode_all(buf: &[u8]) -> (std::result::Result<Option<Reply>, ProtocolError>, usize) {
    let mut cursor = 0;
    let res = Decoder::default().decode_one(buf, &mut cursor);
    (res, cursor)
}

fn strict() -> Decoder {
    Decoder::new(512, true)
}

#[test]
fn encode_get_command() {
    let cmd = Command::cmd("GET").arg("k");
    assert_eq!(encode_command(&cmd), b"*2\r\n$3\r\nGET\r\n$1\r\nk\r\n");
}

#[test]
fn encode_binary_and_empty_arguments() {
    let cmd = Command::new(vec![
        Bytes::from_static(b"SET"),
        Bytes::from_static(b"a\r\nb\0"),
        Bytes::new(),
    ])
    .unwrap();
    assert_eq!(
        encode_command(&cmd),
        b"*3\r\n$3\r\nSET\r\n$5\r\na\r\nb\0\r\n$0\r\n\r\n"
    );
    assert_eq!(encode_bulk(b""), b"$0\r\n\r\n");
}

#[test]
fn empty_command_is_rejected() {
    let res = Command::new(Vec::<Bytes>::new());
    assert!(matches!(res, Err(DriverError::EmptyCommand)));
}

#[test]
fn decode_simple_replies() {
    let (res, cursor) = decode_all(b"+OK\r\n");
    assert_eq!(res, Ok(Some(Reply::Status("OK".into()))));
    assert_eq!(cursor, 5);

    let (res, _) = decode_all(b"-ERR unknown command\r\n");
    assert_eq!(res, Ok(Some(Reply::Error("ERR unknown command".into()))));

    let (res, _) = decode_all(b":-42\r\n");
    assert_eq!(res, Ok(Some(Reply::Integer(-42))));

    let (res, _) = decode_all(b"$5\r\nhello\r\n");
    assert_eq!(res, Ok(Some(Reply::bulk("hello"))));
}

#[test]
fn null_and_empty_bulk_differ() {
    let (null, _) = decode_all(b"$-1\r\n");
    let (empty, cursor) = decode_all(b"$0\r\n\r\n");
    assert_eq!(null, Ok(Some(Reply::Bulk(None))));
    assert_eq!(empty, Ok(Some(Reply::bulk(Bytes::new()))));
    assert_eq!(cursor, 6);
    assert!(null.unwrap().unwrap().is_nil());
}

#[test]
fn bulk_payload_is_binary_safe() {
    let (res, _) = decode_all(b"$4\r\n\r\n\0\xff\r\n");
    assert_eq!(res, Ok(Some(Reply::bulk(&b"\r\n\0\xff"[..]))));
}

#[test]
fn decode_nested_arrays() {
    let frame = b"*3\r\n:1\r\n*2\r\n$1\r\na\r\n*1\r\n$-1\r\n*0\r\n";
    let (res, cursor) = decode_all(frame);
    let expected = Reply::Array(vec![
        Reply::Integer(1),
        Reply::Array(vec![
            Reply::bulk("a"),
            Reply::Array(vec![Reply::Bulk(None)]),
        ]),
        Reply::Array(vec![]),
    ]);
    assert_eq!(res, Ok(Some(expected)));
    assert_eq!(cursor, frame.len());
}

#[test]
fn integers_reply_array() {
    let (res, _) = decode_all(b"*3\r\n:1\r\n:2\r\n:3\r\n");
    let items = res.unwrap().unwrap().into_vec().unwrap();
    let ints: Vec<i64> = items.iter().filter_map(Reply::as_integer).collect();
    assert_eq!(ints, vec![1, 2, 3]);
}

#[test]
fn every_strict_prefix_is_incomplete() {
    let frame: &[u8] = b"*2\r\n$5\r\nhello\r\n*2\r\n:7\r\n$-1\r\n";
    let decoder = Decoder::default();
    for end in 0..frame.len() {
        let mut cursor = 0;
        assert_eq!(
            decoder.decode_one(&frame[..end], &mut cursor),
            Ok(None),
            "prefix of {} bytes",
            end
        );
        assert_eq!(cursor, 0, "cursor moved on prefix of {} bytes", end);
    }
    let mut cursor = 0;
    assert!(matches!(decoder.decode_one(frame, &mut cursor), Ok(Some(Reply::Array(_)))));
    assert_eq!(cursor, frame.len());
}

#[test]
fn rollback_from_nonzero_cursor() {
    // A consumed reply in front, then a truncated one
    let buf = b"+OK\r\n$10\r\nabc";
    let decoder = Decoder::default();
    let mut cursor = 0;
    assert_eq!(
        decoder.decode_one(buf, &mut cursor),
        Ok(Some(Reply::Status("OK".into())))
    );
    assert_eq!(cursor, 5);
    assert_eq!(decoder.decode_one(buf, &mut cursor), Ok(None));
    assert_eq!(cursor, 5);
}

#[test]
fn truncated_array_rolls_back_to_marker() {
    // First element complete, second missing entirely
    let buf = b"*2\r\n$3\r\nfoo\r\n";
    let decoder = Decoder::default();
    let mut cursor = 0;
    assert_eq!(decoder.parse_array(buf, &mut cursor), Ok(None));
    assert_eq!(cursor, 0);

    // Truncated inside a nested element
    let buf = b"*2\r\n*2\r\n:1\r\n:2\r\n*1\r\n$4\r\nab";
    assert_eq!(decoder.parse_array(buf, &mut cursor), Ok(None));
    assert_eq!(cursor, 0);
}

#[test]
fn integer_and_bulk_rollback() {
    let decoder = Decoder::default();

    let mut cursor = 1;
    assert_eq!(decoder.parse_integer(b":12", &mut cursor), Ok(None));
    assert_eq!(cursor, 1);

    let mut cursor = 0;
    assert_eq!(decoder.parse_bulk_string(b"$5\r\nhel", &mut cursor), Ok(None));
    assert_eq!(cursor, 0);
    // Payload present, trailing CRLF not yet
    assert_eq!(decoder.parse_bulk_string(b"$5\r\nhello", &mut cursor), Ok(None));
    assert_eq!(cursor, 0);
}

#[test]
fn lenient_integers_stop_at_garbage() {
    let (res, cursor) = decode_all(b":12abc\r\n");
    assert_eq!(res, Ok(Some(Reply::Integer(12))));
    assert_eq!(cursor, 8);
}

#[test]
fn strict_integers_reject_garbage() {
    let mut cursor = 0;
    let res = strict().decode_one(b":12abc\r\n", &mut cursor);
    assert_eq!(res, Err(ProtocolError::InvalidInteger("12abc".into())));

    let mut cursor = 0;
    let res = strict().decode_one(b":99999999999999999999\r\n", &mut cursor);
    assert!(matches!(res, Err(ProtocolError::InvalidInteger(_))));

    let mut cursor = 0;
    let res = strict().decode_one(b":-9223372036854775808\r\n", &mut cursor);
    assert_eq!(res, Ok(Some(Reply::Integer(i64::MIN))));
}

#[test]
fn strict_bulk_requires_terminator() {
    let mut cursor = 0;
    let res = strict().decode_one(b"$3\r\nfooXY", &mut cursor);
    assert_eq!(res, Err(ProtocolError::MissingTerminator));

    // Lenient mode skips the two bytes unchecked
    let (res, cursor) = decode_all(b"$3\r\nfooXY");
    assert_eq!(res, Ok(Some(Reply::bulk("foo"))));
    assert_eq!(cursor, 9);
}

#[test]
fn invalid_markers_and_lengths() {
    let (res, _) = decode_all(b"!oops\r\n");
    assert_eq!(res, Err(ProtocolError::InvalidTypeMarker(b'!')));

    let (res, _) = decode_all(b"$-2\r\n");
    assert_eq!(res, Err(ProtocolError::InvalidLength(-2)));

    let (res, _) = decode_all(b"*-5\r\n");
    assert_eq!(res, Err(ProtocolError::InvalidLength(-5)));
}

#[test]
fn null_array_is_null_reply() {
    let (res, cursor) = decode_all(b"*-1\r\n");
    assert_eq!(res, Ok(Some(Reply::Bulk(None))));
    assert_eq!(cursor, 5);
}

#[test]
fn status_and_error_not_allowed_inside_array() {
    let (res, _) = decode_all(b"*2\r\n:1\r\n+OK\r\n");
    assert_eq!(res, Err(ProtocolError::UnexpectedElement(b'+')));

    let (res, _) = decode_all(b"*1\r\n-ERR\r\n");
    assert_eq!(res, Err(ProtocolError::UnexpectedElement(b'-')));
}

#[test]
fn nesting_depth_limit() {
    let decoder = Decoder::new(4, false);
    let ok = common::nested_array(4, b":1\r\n");
    let mut cursor = 0;
    assert!(matches!(decoder.decode_one(&ok, &mut cursor), Ok(Some(_))));

    let deep = common::nested_array(5, b":1\r\n");
    let mut cursor = 0;
    assert_eq!(
        decoder.decode_one(&deep, &mut cursor),
        Err(ProtocolError::NestingTooDeep(4))
    );
    assert_eq!(cursor, 0);
}

#[test]
fn huge_array_count_does_not_preallocate() {
    // Claims four billion elements, delivers one
    let (res, cursor) = decode_all(b"*4000000000\r\n:1\r\n");
    assert_eq!(res, Ok(None));
    assert_eq!(cursor, 0);
}

#[test]
fn random_chunking_yields_same_replies() {
    let frames: Vec<(&[u8], Reply)> = vec![
        (&b"+PONG\r\n"[..], Reply::Status("PONG".into())),
        (&b":1000\r\n"[..], Reply::Integer(1000)),
        (&b"$-1\r\n"[..], Reply::Bulk(None)),
        (
            &b"*2\r\n$3\r\nfoo\r\n*1\r\n$0\r\n\r\n"[..],
            Reply::Array(vec![
                Reply::bulk("foo"),
                Reply::Array(vec![Reply::bulk(Bytes::new())]),
            ]),
        ),
        (&b"-ERR wrong type\r\n"[..], Reply::Error("ERR wrong type".into())),
    ];
    let stream: Vec<u8> = frames.iter().flat_map(|(f, _)| f.iter().copied()).collect();
    let expected: Vec<Reply> = frames.into_iter().map(|(_, r)| r).collect();

    let decoder = Decoder::default();
    let mut rng = StdRng::seed_from_u64(0x1611);
    for _ in 0..200 {
        let mut buf = ReceiveBuffer::new();
        let mut fed = 0;
        let mut got = Vec::new();
        while got.len() < expected.len() {
            let (data, cursor) = buf.parts_mut();
            match decoder.decode_one(data, cursor).unwrap() {
                Some(reply) => got.push(reply),
                None => {
                    assert!(fed < stream.len(), "decoder stalled with all bytes fed");
                    let n = rng.gen_range(1..=7).min(stream.len() - fed);
                    buf.extend_from_slice(&stream[fed..fed + n]);
                    fed += n;
                    buf.compact();
                }
            }
        }
        assert_eq!(got, expected);
        assert!(buf.remaining().is_empty());
    }
}

#[test]
fn receive_buffer_compaction() {
    let mut buf = ReceiveBuffer::new();
    buf.extend_from_slice(b"+OK\r\n+PART");
    let (data, cursor) = buf.parts_mut();
    Decoder::default().decode_one(data, cursor).unwrap();
    assert_eq!(buf.cursor(), 5);

    buf.compact();
    assert_eq!(buf.cursor(), 0);
    assert_eq!(buf.data(), b"+PART");

    buf.set_cursor(100);
    assert_eq!(buf.cursor(), 5);
    buf.clear();
    assert!(buf.is_empty());
}

#[test]
fn reply_display_matches_cli_output() {
    assert_eq!(Reply::Integer(3).to_string(), "(integer) 3");
    assert_eq!(Reply::Bulk(None).to_string(), "(nil)");
    assert_eq!(Reply::bulk("hi").to_string(), "\"hi\"");
    assert_eq!(Reply::Error("ERR x".into()).to_string(), "(error) ERR x");
    assert_eq!(Reply::Array(vec![]).to_string(), "(empty array)");
    let nested = Reply::Array(vec![
        Reply::bulk("a"),
        Reply::Array(vec![Reply::Integer(1), Reply::Integer(2)]),
    ]);
    assert_eq!(nested.to_string(), "1) \"a\"\n2) 1) (integer) 1\n   2) (integer) 2");
}
