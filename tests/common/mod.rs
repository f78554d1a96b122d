//! Scripted resolver-library backend shared by the integration tests.
//!
//! Answers are programmed per query key (`"A example.com"`,
//! `"SRV _grpclb._tcp.example.com"`, ...). Unscripted queries answer
//! `NotFound`. A reply can be delayed, or held until the test releases it.

#![allow(dead_code)]

use rpcresolv::base::QueryStatus;
use rpcresolv::dns::{
    AddressFamily, ChannelOptions, DnsBackend, DnsChannel, Lookup, Name, SrvRecord, TxtSegment,
};
use rpcresolv::base::ResolveError;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone)]
pub enum Answer {
    Hosts(Result<Vec<IpAddr>, QueryStatus>),
    Srv(Result<Vec<SrvRecord>, QueryStatus>),
    Txt(Result<Vec<TxtSegment>, QueryStatus>),
    /// The lookup future panics when polled.
    Panic,
}

struct Reply {
    answer: Answer,
    delay: Duration,
}

#[derive(Default)]
struct Script {
    replies: HashMap<String, Reply>,
    holds: HashMap<String, oneshot::Receiver<()>>,
    issued: Vec<String>,
    channels: Vec<ChannelOptions>,
}

/// Programmable backend. Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

pub fn ips(list: &[&str]) -> Vec<IpAddr> {
    list.iter().map(|ip| ip.parse().unwrap()).collect()
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(&self, key: &str, answer: Answer) -> &Self {
        self.answer_after(key, answer, Duration::ZERO)
    }

    pub fn answer_after(&self, key: &str, answer: Answer, delay: Duration) -> &Self {
        self.script
            .lock()
            .unwrap()
            .replies
            .insert(key.to_string(), Reply { answer, delay });
        self
    }

    pub fn hosts(&self, key: &str, list: &[&str]) -> &Self {
        self.answer(key, Answer::Hosts(Ok(ips(list))))
    }

    pub fn fail(&self, key: &str, status: QueryStatus) -> &Self {
        let answer = if key.starts_with("SRV ") {
            Answer::Srv(Err(status))
        } else if key.starts_with("TXT ") {
            Answer::Txt(Err(status))
        } else {
            Answer::Hosts(Err(status))
        };
        self.answer(key, answer)
    }

    /// Holds the reply for `key` until the returned sender fires or drops.
    pub fn hold(&self, key: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().unwrap().holds.insert(key.to_string(), rx);
        tx
    }

    /// Query keys in the order they were issued.
    pub fn issued(&self) -> Vec<String> {
        self.script.lock().unwrap().issued.clone()
    }

    /// Options of every channel created so far.
    pub fn channels(&self) -> Vec<ChannelOptions> {
        self.script.lock().unwrap().channels.clone()
    }

    fn query(&self, key: String) -> (Option<Answer>, Duration, Option<oneshot::Receiver<()>>) {
        let mut script = self.script.lock().unwrap();
        script.issued.push(key.clone());
        let hold = script.holds.remove(&key);
        match script.replies.get(&key) {
            Some(reply) => (Some(reply.answer.clone()), reply.delay, hold),
            None => (None, Duration::ZERO, hold),
        }
    }

    fn respond<T: Send + 'static>(
        &self,
        key: String,
        pick: fn(Answer) -> Option<Result<T, QueryStatus>>,
    ) -> Lookup<T> {
        let (answer, delay, hold) = self.query(key);
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if let Some(hold) = hold {
                let _ = hold.await;
            }
            if matches!(answer, Some(Answer::Panic)) {
                panic!("scripted lookup panic");
            }
            answer.and_then(pick).unwrap_or(Err(QueryStatus::NotFound))
        })
    }
}

impl DnsBackend for ScriptedBackend {
    fn new_channel(&self, options: &ChannelOptions) -> Result<Arc<dyn DnsChannel>, ResolveError> {
        self.script.lock().unwrap().channels.push(options.clone());
        Ok(Arc::new(self.clone()))
    }
}

impl DnsChannel for ScriptedBackend {
    fn lookup_host(&self, host: Name, family: AddressFamily) -> Lookup<Vec<IpAddr>> {
        let kind = match family {
            AddressFamily::Ipv4 => "A",
            AddressFamily::Ipv6 => "AAAA",
        };
        self.respond(format!("{kind} {host}"), |answer| match answer {
            Answer::Hosts(result) => Some(result),
            _ => None,
        })
    }

    fn query_srv(&self, name: Name) -> Lookup<Vec<SrvRecord>> {
        self.respond(format!("SRV {name}"), |answer| match answer {
            Answer::Srv(result) => Some(result),
            _ => None,
        })
    }

    fn query_txt(&self, name: Name) -> Lookup<Vec<TxtSegment>> {
        self.respond(format!("TXT {name}"), |answer| match answer {
            Answer::Txt(result) => Some(result),
            _ => None,
        })
    }
}
