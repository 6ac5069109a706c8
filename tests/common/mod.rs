#![allow(dead_code)]

use msgbuf::AdapterFamily;
use msgbuf::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// 记录所有投递的机器人，可以让第 n 次投递失败
pub struct RecordingBot {
    family: AdapterFamily,
    fail_at: Option<usize>,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<(Destination, Outgoing)>>,
}

impl RecordingBot {
    pub fn new(family: AdapterFamily) -> Arc<Self> {
        Arc::new(Self {
            family,
            fail_at: None,
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_at(family: AdapterFamily, attempt: usize) -> Arc<Self> {
        Arc::new(Self {
            family,
            fail_at: Some(attempt),
            attempts: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<(Destination, Outgoing)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn outgoing(&self) -> Vec<Outgoing> {
        self.delivered().into_iter().map(|(_, o)| o).collect()
    }
}

#[async_trait]
impl Bot for RecordingBot {
    fn id(&self) -> &str {
        "recording"
    }

    fn family(&self) -> AdapterFamily {
        self.family
    }

    async fn deliver(&self, destination: &Destination, outgoing: &Outgoing) -> AdapterResult<Receipt> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail_at == Some(attempt) {
            return Err("rejected by platform".into());
        }
        self.delivered
            .lock()
            .unwrap()
            .push((destination.clone(), outgoing.clone()));
        Ok(Receipt::with_id(attempt))
    }
}

pub fn session(bot: &Arc<RecordingBot>) -> Session {
    Session::new(bot.clone(), Destination::group(10001))
}

/// 消息中各原生消息段的类型
pub fn types(outgoing: &Outgoing) -> Vec<String> {
    match outgoing {
        Outgoing::Message { segments, .. } => segments.iter().map(|s| s.type_.clone()).collect(),
        Outgoing::Action { action, .. } => vec![action.clone()],
    }
}

/// 消息中的全部文本
pub fn text_of(outgoing: &Outgoing) -> String {
    match outgoing {
        Outgoing::Message { segments, .. } => segments
            .iter()
            .filter_map(|s| s.get_str("text"))
            .collect(),
        Outgoing::Action { .. } => String::new(),
    }
}
