use std::collections::HashMap;

use tracing::{debug, warn};

use nanite_core::models::{Answer, Results, ResultPacket, Token};

/// 应答已全部收齐的请求
#[derive(Debug, Clone, PartialEq)]
pub struct Fulfilled {
    pub token: Token,
    pub results: Results,
}

/// 将异步到达的结果归并回在途请求
pub trait Reducer: Send {
    /// 开始跟踪一个在途请求
    fn watch_for(&mut self, answer: Answer);

    /// 处理一条结果，请求的所有目标都已应答时返回 [`Fulfilled`]
    fn handle_result(&mut self, result: ResultPacket) -> Option<Fulfilled>;

    /// 放弃跟踪（如请求已超时），返回此前是否在跟踪
    fn forget(&mut self, token: &str) -> bool;

    fn is_watching(&self, token: &str) -> bool;
}

/// 默认归并器：等待 [`Answer`] 中每个目标nanite都返回结果
#[derive(Debug, Default)]
pub struct AnswerReducer {
    answers: HashMap<Token, Answer>,
}

impl AnswerReducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

impl Reducer for AnswerReducer {
    fn watch_for(&mut self, answer: Answer) {
        debug!("开始跟踪请求 {} 的应答", answer.token);
        self.answers.insert(answer.token.clone(), answer);
    }

    fn handle_result(&mut self, result: ResultPacket) -> Option<Fulfilled> {
        let Some(answer) = self.answers.get_mut(&result.token) else {
            debug!("收到未跟踪请求 {} 的结果，已丢弃", result.token);
            return None;
        };

        if !answer.record(&result.from, result.results) {
            warn!(
                "nanite {} 不是请求 {} 的目标，结果已丢弃",
                result.from, result.token
            );
            return None;
        }

        if !answer.is_complete() {
            return None;
        }

        let answer = self.answers.remove(&result.token)?;
        Some(Fulfilled {
            results: answer.results(),
            token: answer.token,
        })
    }

    fn forget(&mut self, token: &str) -> bool {
        self.answers.remove(token).is_some()
    }

    fn is_watching(&self, token: &str) -> bool {
        self.answers.contains_key(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result(token: &str, from: &str, value: serde_json::Value) -> ResultPacket {
        ResultPacket {
            token: token.to_string(),
            from: from.to_string(),
            to: "mapper".to_string(),
            results: value,
        }
    }

    #[test]
    fn test_fulfilled_after_all_targets() {
        let mut reducer = AnswerReducer::new();
        reducer.watch_for(Answer::new("tok".to_string(), ["n1", "n2"]));

        assert!(reducer.handle_result(result("tok", "n1", json!(1))).is_none());
        let fulfilled = reducer.handle_result(result("tok", "n2", json!(2))).unwrap();

        assert_eq!(fulfilled.token, "tok");
        assert_eq!(fulfilled.results.len(), 2);
        assert_eq!(fulfilled.results["n2"], json!(2));
        assert!(!reducer.is_watching("tok"));
    }

    #[test]
    fn test_unknown_token_and_stranger_dropped() {
        let mut reducer = AnswerReducer::new();
        reducer.watch_for(Answer::new("tok".to_string(), ["n1"]));

        assert!(reducer.handle_result(result("other", "n1", json!(1))).is_none());
        assert!(reducer.handle_result(result("tok", "n9", json!(1))).is_none());
        assert!(reducer.is_watching("tok"));
    }

    #[test]
    fn test_forget() {
        let mut reducer = AnswerReducer::new();
        reducer.watch_for(Answer::new("tok".to_string(), ["n1"]));

        assert!(reducer.forget("tok"));
        assert!(!reducer.forget("tok"));
        assert!(reducer.handle_result(result("tok", "n1", json!(1))).is_none());
        assert!(reducer.is_empty());
    }
}
