//! Lua scripts that move jobs between broker keys atomically.
//!
//! Jobs are stored as JSON in the jobs hash. Requeueing rewrites the stored
//! body so the attempt count survives restarts of every consumer.

use redis::Script;

const REQUEUE_FN: &str = r#"
local function requeue(raw)
  local job = cjson.decode(raw)
  job.attempts = (job.attempts or 0) + 1
  job.status = 'pending'
  job.claimed_at = cjson.null
  job.deadline = cjson.null
  return cjson.encode(job)
end
"#;

/// KEYS: jobs, ready. ARGV: id, body. Returns 0 if the id already exists.
const ENQUEUE: &str = r#"
if redis.call('HSETNX', KEYS[1], ARGV[1], ARGV[2]) == 0 then
  return 0
end
redis.call('RPUSH', KEYS[2], ARGV[1])
return 1
"#;

/// KEYS: ready, delayed, in_flight, jobs. ARGV: now_ms.
/// Returns the number of expired claims redelivered.
const PROMOTE: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[2], '-inf', ARGV[1])
for _, id in ipairs(due) do
  redis.call('ZREM', KEYS[2], id)
  redis.call('RPUSH', KEYS[1], id)
end
local expired = redis.call('ZRANGEBYSCORE', KEYS[3], '-inf', ARGV[1])
for _, id in ipairs(expired) do
  redis.call('ZREM', KEYS[3], id)
  local raw = redis.call('HGET', KEYS[4], id)
  if raw then
    redis.call('HSET', KEYS[4], id, requeue(raw))
    redis.call('RPUSH', KEYS[1], id)
  end
end
return #expired
"#;

/// KEYS: ready, in_flight, jobs. ARGV: visibility deadline in ms.
/// Returns the claimed job body, or nil when nothing is ready.
const CLAIM: &str = r#"
while true do
  local id = redis.call('LPOP', KEYS[1])
  if not id then
    return false
  end
  local raw = redis.call('HGET', KEYS[3], id)
  if raw then
    redis.call('ZADD', KEYS[2], ARGV[1], id)
    return raw
  end
end
"#;

/// KEYS: in_flight, jobs. ARGV: id. Returns 0 if the job was not in flight.
const ACK: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
redis.call('HDEL', KEYS[2], ARGV[1])
return 1
"#;

/// KEYS: in_flight, delayed, ready, jobs. ARGV: id, visible_at_ms, delay_ms.
/// Returns 0 if the job was not in flight.
const NACK: &str = r#"
if redis.call('ZREM', KEYS[1], ARGV[1]) == 0 then
  return 0
end
local raw = redis.call('HGET', KEYS[4], ARGV[1])
if not raw then
  return 0
end
redis.call('HSET', KEYS[4], ARGV[1], requeue(raw))
if tonumber(ARGV[3]) == 0 then
  redis.call('RPUSH', KEYS[3], ARGV[1])
else
  redis.call('ZADD', KEYS[2], ARGV[2], ARGV[1])
end
return 1
"#;

/// Compiled broker scripts.
#[derive(Debug, Clone)]
pub struct BrokerScripts {
    pub enqueue: Script,
    pub promote: Script,
    pub claim: Script,
    pub ack: Script,
    pub nack: Script,
}

impl BrokerScripts {
    /// Build every script once.
    pub fn new() -> Self {
        Self {
            enqueue: Script::new(ENQUEUE),
            promote: Script::new(&format!("{REQUEUE_FN}{PROMOTE}")),
            claim: Script::new(CLAIM),
            ack: Script::new(ACK),
            nack: Script::new(&format!("{REQUEUE_FN}{NACK}")),
        }
    }
}

impl Default for BrokerScripts {
    fn default() -> Self {
        Self::new()
    }
}
