//! `Conn` driven through a scripted in-memory transport.
//!
//! The mock records every dial, sent batch and close, and answers each
//! `receive` with the next scripted reply.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use nftlink::netlink::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_DUMP, NLM_F_MULTI, NLM_F_REQUEST};
use nftlink::netlink::{AttrIter, Dial, Message, NlMsgHdr, NlMsgType, Transport};
use nftlink::nftables::{
    CounterObj, NFT_MSG_NEWOBJ, NFTA_OBJ_DATA, NFTA_OBJ_TABLE, NfGenMsg, ObjectType, QuotaObj,
    msg_type,
};
use nftlink::{Conn, EncodeError, Error, Object, Result, Table, TableFamily};

#[derive(Default)]
struct State {
    replies: VecDeque<Result<Vec<Message>>>,
    sent: Vec<Vec<Message>>,
    dials: u32,
    closes: u32,
    fail_send: bool,
}

#[derive(Clone, Default)]
struct Script(Rc<RefCell<State>>);

impl Script {
    fn reply(self, messages: Vec<Message>) -> Self {
        self.0.borrow_mut().replies.push_back(Ok(messages));
        self
    }

    fn fail(self, err: Error) -> Self {
        self.0.borrow_mut().replies.push_back(Err(err));
        self
    }

    fn fail_send(self) -> Self {
        self.0.borrow_mut().fail_send = true;
        self
    }

    fn conn(&self) -> Conn<Script> {
        Conn::with_dialer(self.clone())
    }

    fn dials(&self) -> u32 {
        self.0.borrow().dials
    }

    fn closes(&self) -> u32 {
        self.0.borrow().closes
    }

    fn sent(&self) -> Vec<Vec<Message>> {
        self.0.borrow().sent.clone()
    }
}

struct MockTransport(Script);

impl Dial for Script {
    type Transport = MockTransport;

    fn dial(&self) -> Result<MockTransport> {
        self.0.borrow_mut().dials += 1;
        Ok(MockTransport(self.clone()))
    }
}

impl Transport for MockTransport {
    fn send_messages(&mut self, messages: &[Message]) -> Result<usize> {
        let mut state = self.0.0.borrow_mut();
        if state.fail_send {
            return Err(Error::Io(std::io::Error::from_raw_os_error(libc::ENOBUFS)));
        }
        state.sent.push(messages.to_vec());
        Ok(messages.len())
    }

    fn receive(&mut self) -> Result<Vec<Message>> {
        self.0
            .0
            .borrow_mut()
            .replies
            .pop_front()
            .unwrap_or_else(|| Err(Error::InvalidMessage("script exhausted".into())))
    }

    fn close(&mut self) -> Result<()> {
        self.0.0.borrow_mut().closes += 1;
        Ok(())
    }
}

fn filter() -> Table {
    Table::new("filter", TableFamily::IPv4)
}

fn object_reply(obj: &dyn Object) -> Message {
    let mut data = NfGenMsg::new(obj.family().as_u8(), 0).as_bytes().to_vec();
    data.extend(obj.marshal(true).unwrap());
    Message::new(msg_type(NFT_MSG_NEWOBJ), NLM_F_MULTI, data)
}

fn ack() -> Message {
    let mut data = 0i32.to_ne_bytes().to_vec();
    data.extend_from_slice(NlMsgHdr::new(msg_type(NFT_MSG_NEWOBJ), NLM_F_REQUEST).as_bytes());
    Message::new(NlMsgType::ERROR, 0, data)
}

fn counter(name: &str, packets: u64, bytes: u64) -> CounterObj {
    CounterObj::new(filter(), name).packets(packets).bytes(bytes)
}

#[test]
fn test_get_obj_round_trip() {
    let script = Script::default().reply(vec![object_reply(&counter("ctr1", 10, 1500)), ack()]);
    let conn = script.conn();

    let objs = conn.get_obj(&CounterObj::new(filter(), "ctr1")).unwrap();
    assert_eq!(objs.len(), 1);

    let ctr = objs[0].as_any().downcast_ref::<CounterObj>().unwrap();
    assert_eq!(ctr, &counter("ctr1", 10, 1500));
    assert_eq!(objs[0].to_string(), "counter ip filter ctr1 { packets 10 bytes 1500 }");

    assert_eq!(script.dials(), 1);
    assert_eq!(script.closes(), 1);
}

#[test]
fn test_get_obj_request_shape() {
    let script = Script::default().reply(vec![]);
    let conn = script.conn();
    let probe = counter("ctr1", 10, 1500);
    assert!(conn.get_obj(&probe).unwrap().is_empty());

    let sent = script.sent();
    assert_eq!(sent.len(), 1);
    let msg = &sent[0][0];
    assert_eq!(msg.msg_type(), 0x0a13);
    assert_eq!(msg.flags(), NLM_F_REQUEST | NLM_F_ACK | NLM_F_DUMP);
    assert_eq!(&msg.data[..4], &[2, 0, 0, 0]);

    let kinds: Vec<u16> = AttrIter::new(&msg.data[4..])
        .map(|attr| attr.unwrap().0)
        .collect();
    assert!(!kinds.contains(&NFTA_OBJ_DATA));
}

#[test]
fn test_get_obj_reset_message_type() {
    let script = Script::default().reply(vec![object_reply(&counter("ctr1", 0, 0))]);
    let objs = script.conn().get_obj_reset(&counter("ctr1", 0, 0)).unwrap();
    assert_eq!(objs.len(), 1);
    assert_eq!(script.sent()[0][0].msg_type(), 0x0a15);
}

#[test]
fn test_replies_in_receive_order() {
    let script = Script::default().reply(vec![
        object_reply(&counter("a", 1, 100)),
        object_reply(&counter("b", 2, 200)),
        object_reply(&counter("c", 3, 300)),
        ack(),
    ]);
    let objs = script.conn().get_obj(&counter("a", 0, 0)).unwrap();

    let names: Vec<&str> = objs.iter().map(|obj| obj.name()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
}

#[test]
fn test_get_objs_mixed_types() {
    let quota = QuotaObj::new(filter(), "q1").bytes(1 << 20);
    let script = Script::default().reply(vec![
        object_reply(&counter("ctr1", 1, 2)),
        object_reply(&quota),
    ]);
    let objs = script.conn().get_objs(&filter()).unwrap();

    assert_eq!(objs[0].object_type(), ObjectType::COUNTER);
    assert_eq!(objs[1].object_type(), ObjectType::QUOTA);
    assert_eq!(objs[1].as_any().downcast_ref::<QuotaObj>(), Some(&quota));

    // Only the table attribute is sent.
    let sent = script.sent();
    let attrs: Vec<_> = AttrIter::new(&sent[0][0].data[4..])
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(attrs, vec![(NFTA_OBJ_TABLE, &b"filter\0"[..])]);
}

#[test]
fn test_get_objs_empty_table_name() {
    let script = Script::default();
    let err = script
        .conn()
        .get_objs(&Table::new("", TableFamily::Inet))
        .unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::MissingField("table"))));
    assert_eq!(script.closes(), script.dials());
}

#[test]
fn test_decode_failure_returns_no_objects() {
    let mut bad = object_reply(&counter("b", 0, 0));
    bad.header.nlmsg_type = msg_type(NFT_MSG_NEWOBJ) + 1;
    let script = Script::default().reply(vec![object_reply(&counter("a", 0, 0)), bad]);

    let err = script.conn().get_obj(&counter("a", 0, 0)).unwrap_err();
    assert!(matches!(err, Error::UnexpectedHeader { .. }));
    assert_eq!(script.closes(), 1);
}

#[test]
fn test_truncated_reply() {
    let mut reply = object_reply(&counter("a", 0, 0));
    let len = reply.data.len();
    reply.data.truncate(len - 5);
    let script = Script::default().reply(vec![reply]);

    let err = script.conn().get_obj(&counter("a", 0, 0)).unwrap_err();
    assert!(matches!(err, Error::Truncated { .. }));
}

#[test]
fn test_encode_error_on_read_closes_transport() {
    let script = Script::default();
    let err = script.conn().get_obj(&CounterObj::new(filter(), "")).unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::MissingField("name"))));
    assert_eq!(script.dials(), 1);
    assert_eq!(script.closes(), 1);
    assert!(script.sent().is_empty());
}

#[test]
fn test_send_failure_is_wrapped() {
    let script = Script::default().fail_send();
    let err = script.conn().get_obj(&counter("a", 0, 0)).unwrap_err();
    match &err {
        Error::Transport { operation, source } => {
            assert_eq!(*operation, "send");
            assert!(matches!(**source, Error::Io(_)));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert_eq!(script.closes(), 1);
}

#[test]
fn test_kernel_error_on_read() {
    let script = Script::default().fail(Error::from_errno(-libc::ENOENT));
    let err = script.conn().get_obj(&counter("a", 0, 0)).unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().starts_with("receive: "));
    assert_eq!(script.closes(), 1);
}

#[test]
fn test_flush_frames_batch() {
    let script = Script::default().reply(vec![ack()]).reply(vec![ack()]);
    let mut conn = script.conn();
    conn.add_obj(&counter("ctr1", 0, 0)).unwrap();
    conn.del_obj(&counter("old", 0, 0)).unwrap();
    conn.flush().unwrap();

    let sent = script.sent();
    assert_eq!(sent.len(), 1);
    let batch = &sent[0];
    assert_eq!(batch.len(), 4);

    assert_eq!(batch[0].msg_type(), NlMsgType::NFNL_BATCH_BEGIN);
    assert_eq!(batch[0].data, vec![libc::AF_UNSPEC as u8, 0, 0, 10]);
    assert_eq!(batch[1].msg_type(), 0x0a12);
    assert_eq!(batch[1].flags(), NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE);
    assert_eq!(batch[2].msg_type(), 0x0a14);
    assert_eq!(batch[3].msg_type(), NlMsgType::NFNL_BATCH_END);

    // Both scripted acknowledgements were consumed.
    assert!(script.0.borrow().replies.is_empty());
    assert_eq!(script.closes(), 1);
    assert_eq!(conn.pending(), 0);
}

#[test]
fn test_flush_kernel_error() {
    let script = Script::default().fail(Error::from_errno(-libc::EEXIST));
    let mut conn = script.conn();
    conn.add_obj(&counter("ctr1", 0, 0)).unwrap();

    let err = conn.flush().unwrap_err();
    assert!(err.is_already_exists());
    assert!(err.to_string().contains("committing batch"));
    assert_eq!(conn.pending(), 0);
    assert_eq!(script.closes(), 1);
}

#[test]
fn test_deferred_error_sends_nothing() {
    let script = Script::default();
    let mut conn = script.conn();

    assert!(conn.add_obj(&CounterObj::new(Table::new("", TableFamily::IPv4), "x")).is_err());
    conn.add_obj(&counter("ctr2", 0, 0)).unwrap();
    assert_eq!(conn.pending(), 1);
    assert_eq!(conn.err(), Some(&EncodeError::MissingField("table")));

    let err = conn.flush().unwrap_err();
    assert!(matches!(err, Error::Encode(EncodeError::MissingField("table"))));
    assert_eq!(script.dials(), 0);
    assert!(script.sent().is_empty());

    // The builder is usable again.
    assert!(conn.err().is_none());
    assert!(conn.flush().is_ok());
}
