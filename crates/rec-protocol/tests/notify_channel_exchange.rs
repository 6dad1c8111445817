//! Models one realistic notification-channel exchange: an anonymous auth
//! handshake followed by a compressed batch of app-data commands, exactly
//! as they'd arrive back-to-back on the wire.

use rec_protocol::{AppDataEnvelope, AuthPayload, ConnectReply, Frame, Operation, WatchCommand};

#[test]
fn auth_handshake_then_compressed_command_batch() {
    let auth = AuthPayload::anonymous(12345, "device-abc".to_owned(), "token-xyz".to_owned());
    let connect_frame = Frame::plain_json(Operation::Connect, &auth).unwrap();
    let on_wire = connect_frame.encode().unwrap();

    let decoded = Frame::decode(&on_wire).unwrap();
    assert_eq!(decoded.operation, Operation::Connect);
    let replayed: AuthPayload = serde_json::from_slice(&decoded.body).unwrap();
    assert_eq!(replayed, auth);

    let reply = Frame::plain_json(Operation::ConnectOk, &ConnectReply { code: 0 }).unwrap();
    let reply_body: ConnectReply = serde_json::from_slice(&reply.body).unwrap();
    assert!(reply_body.is_ok());

    // Two commands arrive concatenated inside one zlib-compressed AppData
    // frame, as the platform actually batches them.
    use std::io::Write;
    let preparing = Frame::plain_json(
        Operation::AppData,
        &AppDataEnvelope {
            cmd: "PREPARING".to_owned(),
            data: serde_json::Value::Null,
        },
    )
    .unwrap();
    let live = Frame::plain_json(
        Operation::AppData,
        &AppDataEnvelope {
            cmd: "LIVE".to_owned(),
            data: serde_json::Value::Null,
        },
    )
    .unwrap();

    let mut plain = preparing.encode().unwrap();
    plain.extend(live.encode().unwrap());

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&plain).unwrap();
    let compressed = encoder.finish().unwrap();

    let batch = Frame::new(rec_protocol::ProtocolVersion::Zlib, Operation::AppData, compressed);
    let batch_on_wire = batch.encode().unwrap();
    let batch_decoded = Frame::decode(&batch_on_wire).unwrap();

    let inflated = batch_decoded.inflate().unwrap();
    assert_eq!(inflated.len(), 2);

    let cmds: Vec<WatchCommand> = inflated
        .iter()
        .map(|f| {
            let envelope: AppDataEnvelope = serde_json::from_slice(&f.body).unwrap();
            WatchCommand::parse(&envelope.cmd).unwrap()
        })
        .collect();
    assert_eq!(cmds, vec![WatchCommand::Preparing, WatchCommand::Live]);
}
