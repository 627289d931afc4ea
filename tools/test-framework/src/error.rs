//! Error type used for the tests.

use core::convert::From;
use std::io::{Error as IoError, ErrorKind as IoErrorKind};

use eyre::Report;
use flex_error::{define_error, TraceError};

define_error! {
    Error {
        Generic
            [ TraceError<Report> ]
            | _ | { "generic error" },

        Assertion
            { message: String }
            | e | { format_args!("assertion failure: {}", e.message) },

        Io
            [ TraceError<IoError> ]
            | _ | { "io error"},

        CommandNotFound
            { command: String }
            [ TraceError<IoError> ]
            | e | { format_args!("failed to execute command: {}. make sure it is available in $PATH", e.command) },

        Exec
            { command: String, status: Option<i32>, stderr: String }
            | e | {
                format_args!("command `{}` exited with error status {:?} and message: {}",
                    e.command, e.status, e.stderr)
            },

        Retry
            { task_name: String, attempts: u16 }
            | e | {
                format_args!(
                    "Expected task to eventually succeeed, but failed after {} attempts: {}",
                    e.attempts,
                    e.task_name
                )
            },

        Json
            [ TraceError<serde_json::Error> ]
            | _ | { "json error" },

        Toml
            [ TraceError<toml::ser::Error> ]
            | _ | { "toml serialization error" },

        MissingField
            { field: String, context: String }
            | e | { format_args!("expected field `{}` in {}", e.field, e.context) },

        UnknownChain
            { name: String }
            | e | { format_args!("no builtin chain configuration found for chain `{}`", e.name) },

        DuplicateChain
            { chain_id: String }
            | e | { format_args!("chain `{}` was already added to the interchain", e.chain_id) },

        DuplicateRelayer
            { name: String }
            | e | { format_args!("relayer `{}` was already added to the interchain", e.name) },

        UnknownLinkMember
            { path: String, member: String }
            | e | {
                format_args!("link `{}` refers to `{}`, which was not added to the interchain",
                    e.path, e.member)
            },

        ChainNotStarted
            { chain_id: String }
            | e | { format_args!("chain `{}` has not been started", e.chain_id) },

        ChainAlreadyStarted
            { chain_id: String }
            | e | { format_args!("chain `{}` has already been started", e.chain_id) },

        MissingNetwork
            { chain_id: String }
            | e | { format_args!("no docker network was provided for chain `{}`", e.chain_id) },

        UnknownKey
            { chain_id: String, key_name: String }
            | e | { format_args!("no key named `{}` on chain `{}`", e.key_name, e.chain_id) },

        InsufficientFunds
            { address: String, denom: String, balance: String, amount: String }
            | e | {
                format_args!("account {} has insufficient funds: balance {}{} is smaller than {}{}",
                    e.address, e.balance, e.denom, e.amount, e.denom)
            },

        UnregisteredType
            { type_url: String }
            | e | {
                format_args!("unable to decode transaction: no concrete type registered for type URL {}",
                    e.type_url)
            },

        MessageNotFound
            { type_url: String, start_height: u64, end_height: u64 }
            | e | {
                format_args!("no message of type {} found between heights {} and {}",
                    e.type_url, e.start_height, e.end_height)
            },

        InvalidTx
            { reasons: Vec<String> }
            | e | { format_args!("invalid transaction: {}", e.reasons.join("; ")) },

        TxFailed
            { tx_hash: String, code: u64, raw_log: String }
            | e | {
                format_args!("transaction {} failed with code {}: {}",
                    e.tx_hash, e.code, e.raw_log)
            },

        ChannelNotFound
            { chain_id: String, selector: String }
            | e | { format_args!("no channel on chain `{}` matches {}", e.chain_id, e.selector) },

        AmbiguousChannel
            { chain_id: String, count: usize }
            | e | {
                format_args!("found {} candidate channels on chain `{}`, an explicit channel selector is required",
                    e.count, e.chain_id)
            },

        UnknownPath
            { path: String }
            | e | { format_args!("no IBC path named `{}` was configured on the relayer", e.path) },

        UnknownChannel
            { chain_id: String, channel_id: String }
            | e | { format_args!("channel `{}` does not exist on chain `{}`", e.channel_id, e.chain_id) },

        InvalidDenomTrace
            { denom: String }
            | e | { format_args!("invalid denomination trace: {}", e.denom) },
    }
}

pub fn handle_generic_error(e: impl Into<Report>) -> Error {
    Error::generic(e.into())
}

pub fn handle_exec_error(command: &str) -> impl FnOnce(IoError) -> Error + '_ {
    |e| match e.kind() {
        IoErrorKind::NotFound => Error::command_not_found(command.to_string(), e),
        _ => Error::io(e),
    }
}

impl From<Report> for Error {
    fn from(e: Report) -> Self {
        Error::generic(e)
    }
}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::io(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::json(e)
    }
}
