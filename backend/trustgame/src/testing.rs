//! In-memory [`ChainGateway`] double shared by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{ClientError, Result};
use crate::rpc::{
    AccountResponse, ApplicationResponse, ChainGateway, CompileResponse, HistoryQuery,
    PendingTxn, TransactionPage,
};

pub enum PageReply {
    Page(TransactionPage),
    Fail { status: u16, body: String },
}

#[derive(Default)]
struct State {
    params_body: Option<String>,
    compiled: HashMap<String, String>,
    submissions: Vec<Vec<u8>>,
    reject: Option<(u16, String)>,
    pending: VecDeque<PendingTxn>,
    pending_lookups: u32,
    accounts: HashMap<String, AccountResponse>,
    applications: HashMap<u64, ApplicationResponse>,
    pages: VecDeque<PageReply>,
    history_queries: Vec<HistoryQuery>,
}

#[derive(Default)]
pub struct MockGateway {
    state: Mutex<State>,
}

impl MockGateway {
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.state.lock().expect("mock state poisoned");
        f(&mut state)
    }

    pub fn set_params_body(&self, body: &str) {
        self.with(|s| s.params_body = Some(body.to_string()));
    }

    pub fn set_compiled(&self, source: &str, result_b64: &str) {
        self.with(|s| s.compiled.insert(source.to_string(), result_b64.to_string()));
    }

    pub fn reject_submissions(&self, status: u16, body: &str) {
        self.with(|s| s.reject = Some((status, body.to_string())));
    }

    pub fn queue_pending(&self, pending: PendingTxn) {
        self.with(|s| s.pending.push_back(pending));
    }

    pub fn insert_account(&self, account: AccountResponse) {
        self.with(|s| s.accounts.insert(account.address.clone(), account));
    }

    pub fn insert_application(&self, app: ApplicationResponse) {
        self.with(|s| s.applications.insert(app.id, app));
    }

    pub fn queue_page(&self, page: TransactionPage) {
        self.with(|s| s.pages.push_back(PageReply::Page(page)));
    }

    pub fn queue_page_failure(&self, status: u16, body: &str) {
        self.with(|s| {
            s.pages.push_back(PageReply::Fail {
                status,
                body: body.to_string(),
            })
        });
    }

    pub fn submissions(&self) -> usize {
        self.with(|s| s.submissions.len())
    }

    pub fn submitted_payloads(&self) -> Vec<Vec<u8>> {
        self.with(|s| s.submissions.clone())
    }

    pub fn pending_lookups(&self) -> u32 {
        self.with(|s| s.pending_lookups)
    }

    pub fn history_queries(&self) -> Vec<HistoryQuery> {
        self.with(|s| s.history_queries.clone())
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    async fn suggested_params(&self) -> Result<String> {
        self.with(|s| s.params_body.clone()).ok_or(ClientError::Upstream {
            status: 503,
            body: "no params configured".to_string(),
        })
    }

    async fn compile(&self, source: &str) -> Result<CompileResponse> {
        self.with(|s| s.compiled.get(source).cloned())
            .map(|result| CompileResponse { result, hash: None })
            .ok_or(ClientError::Upstream {
                status: 400,
                body: "compile error".to_string(),
            })
    }

    async fn send_raw_transaction(&self, payload: &[u8]) -> Result<String> {
        self.with(|s| {
            if let Some((status, body)) = &s.reject {
                return Err(ClientError::Submission {
                    status: *status,
                    body: body.clone(),
                });
            }
            s.submissions.push(payload.to_vec());
            Ok(format!("TX-{}", s.submissions.len()))
        })
    }

    async fn pending_transaction(&self, _tx_id: &str) -> Result<PendingTxn> {
        Ok(self.with(|s| {
            s.pending_lookups += 1;
            s.pending.pop_front().unwrap_or_default()
        }))
    }

    async fn account(&self, address: &str) -> Result<AccountResponse> {
        self.with(|s| s.accounts.get(address).cloned())
            .ok_or(ClientError::Upstream {
                status: 404,
                body: "account not found".to_string(),
            })
    }

    async fn application(&self, app_id: u64) -> Result<ApplicationResponse> {
        self.with(|s| s.applications.get(&app_id).cloned())
            .ok_or(ClientError::Upstream {
                status: 404,
                body: "application does not exist".to_string(),
            })
    }

    async fn search_transactions(&self, query: &HistoryQuery) -> Result<TransactionPage> {
        self.with(|s| {
            s.history_queries.push(query.clone());
            match s.pages.pop_front() {
                Some(PageReply::Page(page)) => Ok(page),
                Some(PageReply::Fail { status, body }) => {
                    Err(ClientError::Upstream { status, body })
                }
                None => Ok(TransactionPage::default()),
            }
        })
    }
}
