/*!
   Helper functions for deriving IBC denom.
*/

use core::fmt::{self, Display};
use ibc_relayer_types::core::ics24_host::identifier::{ChannelId, PortId};
use sha2::{Digest, Sha256};
use subtle_encoding::hex;

use crate::error::{handle_generic_error, Error};

/**
   A newtype wrapper to represent a denomination string.
*/
#[derive(Debug, Clone)]
pub enum Denom {
    Base {
        name: String,
    },
    Ibc {
        path: String,
        denom: Box<Denom>,
        hashed: String,
    },
}

/**
   The trace of a fungible token denomination, made of the
   `port/channel` hops it travelled through and its base denomination
   on the origin chain.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenomTrace {
    pub path: String,
    pub base_denom: String,
}

/**
   Derives the denom on `ChainB` based on a denom on `ChainA` that has been
   transferred to `ChainB` via IBC.

   Accepts the following arguments:

   - A `PortId` on `ChainB` that corresponds to a channel connected
     to `ChainA`.

   - A `ChannelId` on `ChainB` that corresponds to a channel connected
     to `ChainA`.

   - The original denomination on `ChainA`.

   Returns the derived denomination on `ChainB`.
*/
pub fn derive_ibc_denom(
    port_id: &PortId,
    channel_id: &ChannelId,
    denom: &Denom,
) -> Result<Denom, Error> {
    match denom {
        Denom::Base { name } => {
            let path = format!("{port_id}/{channel_id}");
            let hashed = derive_denom_with_path(&format!("{path}/{name}"))?;

            Ok(Denom::Ibc {
                path,
                denom: Box::new(denom.clone()),
                hashed,
            })
        }
        Denom::Ibc { path, denom, .. } => {
            let new_path = format!("{port_id}/{channel_id}/{path}");
            let hashed = derive_denom_with_path(&format!("{new_path}/{denom}"))?;

            Ok(Denom::Ibc {
                path: new_path,
                denom: denom.clone(),
                hashed,
            })
        }
    }
}

/// Derive the transferred token denomination using
/// <https://github.com/cosmos/ibc-go/blob/main/docs/architecture/adr-001-coin-source-tracing.md>
pub fn derive_denom_with_path(transfer_path: &str) -> Result<String, Error> {
    let mut hasher = Sha256::new();
    hasher.update(transfer_path.as_bytes());

    let denom_bytes = hasher.finalize();
    let denom_hex = String::from_utf8(hex::encode_upper(denom_bytes)).map_err(handle_generic_error)?;

    Ok(format!("ibc/{denom_hex}"))
}

/**
   Prefix a denomination with the `port/channel` hop it is received
   through, e.g. `transfer/channel-0/udym`.
*/
pub fn get_prefixed_denom(port_id: &PortId, channel_id: &ChannelId, base_denom: &str) -> String {
    format!("{port_id}/{channel_id}/{base_denom}")
}

/// Channel identifiers generated by ibc-go have the form `channel-{N}`.
fn is_valid_channel_id(channel_id: &str) -> bool {
    channel_id
        .strip_prefix("channel-")
        .map(|sequence| !sequence.is_empty() && sequence.parse::<u64>().is_ok())
        .unwrap_or(false)
}

impl DenomTrace {
    /**
       Parse a full denomination path such as `transfer/channel-0/udym`
       into its trace. Only hops whose channel part is a channel identifier
       generated by ibc-go are considered part of the path; anything after
       the first malformed hop belongs to the base denomination.
    */
    pub fn parse(full_denom: &str) -> Self {
        let items: Vec<&str> = full_denom.split('/').collect();

        if items.len() == 1 {
            return Self {
                path: String::new(),
                base_denom: full_denom.to_string(),
            };
        }

        let mut path = Vec::new();
        let mut base = Vec::new();
        let length = items.len();

        let mut i = 0;
        while i < length {
            if i < length - 1 && length > 2 && is_valid_channel_id(items[i + 1]) {
                path.push(items[i]);
                path.push(items[i + 1]);
                i += 2;
            } else {
                base = items[i..].to_vec();
                break;
            }
        }

        Self {
            path: path.join("/"),
            base_denom: base.join("/"),
        }
    }

    pub fn full_path(&self) -> String {
        if self.path.is_empty() {
            self.base_denom.clone()
        } else {
            format!("{}/{}", self.path, self.base_denom)
        }
    }

    /**
       The denomination under which the token is held on the chain: the
       base denomination for native tokens, `ibc/{HASH}` for vouchers.
    */
    pub fn ibc_denom(&self) -> Result<String, Error> {
        if self.path.is_empty() {
            Ok(self.base_denom.clone())
        } else {
            derive_denom_with_path(&self.full_path())
        }
    }

    /**
       Whether the token was last received through the given port and
       channel, i.e. whether sending it back through that hop returns
       it towards its source.
    */
    pub fn has_prefix(&self, port_id: &str, channel_id: &str) -> bool {
        let prefix = format!("{port_id}/{channel_id}");
        self.path == prefix || self.path.starts_with(&format!("{prefix}/"))
    }

    /// Remove the leading `port/channel` hop from the path.
    pub fn remove_prefix(&self) -> Self {
        let mut hops = self.path.splitn(3, '/');
        let _port = hops.next();
        let _channel = hops.next();

        Self {
            path: hops.next().unwrap_or_default().to_string(),
            base_denom: self.base_denom.clone(),
        }
    }

    /// Add a `port/channel` hop in front of the path.
    pub fn add_prefix(&self, port_id: &str, channel_id: &str) -> Self {
        let path = if self.path.is_empty() {
            format!("{port_id}/{channel_id}")
        } else {
            format!("{port_id}/{channel_id}/{}", self.path)
        };

        Self {
            path,
            base_denom: self.base_denom.clone(),
        }
    }
}

impl Denom {
    pub fn base(name: &str) -> Self {
        Denom::Base {
            name: name.to_owned(),
        }
    }

    pub fn hash_only(&self) -> String {
        match self {
            Denom::Base { name } => name.to_string(),
            Denom::Ibc { hashed, .. } => match hashed.find('/') {
                Some(index) => hashed[index + 1..].to_string(),
                None => hashed.to_string(),
            },
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Denom::Base { name } => name,
            Denom::Ibc { hashed, .. } => hashed,
        }
    }

    /// The full trace of the denomination, e.g. `transfer/channel-0/udym`.
    pub fn trace(&self) -> DenomTrace {
        match self {
            Denom::Base { name } => DenomTrace {
                path: String::new(),
                base_denom: name.clone(),
            },
            Denom::Ibc { path, denom, .. } => DenomTrace {
                path: path.clone(),
                base_denom: denom.to_string(),
            },
        }
    }
}

impl Display for Denom {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{}", self.as_str())
    }
}

impl PartialEq for Denom {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Base { name: n1 }, Self::Base { name: n2 }) => n1 == n2,
            (
                Self::Ibc {
                    path: p1,
                    denom: d1,
                    hashed: h1,
                },
                Self::Ibc {
                    path: p2,
                    denom: d2,
                    hashed: h2,
                },
            ) => p1 == p2 && d1 == d2 && h1 == h2,
            _ => self.as_str() == other.as_str(),
        }
    }
}

impl Eq for Denom {}

#[cfg(test)]
mod tests {
    use core::str::FromStr;

    use super::*;

    fn transfer_port() -> PortId {
        PortId::from_str("transfer").unwrap()
    }

    fn channel(id: &str) -> ChannelId {
        ChannelId::from_str(id).unwrap()
    }

    #[test_log::test]
    fn derives_known_atom_voucher() {
        // Well-known hash of ATOM received over channel-0 on many Cosmos chains.
        let denom = derive_ibc_denom(&transfer_port(), &channel("channel-0"), &Denom::base("uatom"))
            .unwrap();

        assert_eq!(
            denom.as_str(),
            "ibc/27394FB092D2ECCD56123C74F36E4C1F926001CEADA9CA97EA622B25F41E5EB2"
        );
    }

    #[test_log::test]
    fn derivation_is_deterministic() {
        let first = derive_ibc_denom(&transfer_port(), &channel("channel-7"), &Denom::base("udym"))
            .unwrap();
        let second = derive_ibc_denom(&transfer_port(), &channel("channel-7"), &Denom::base("udym"))
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), second.as_str());
    }

    #[test_log::test]
    fn derivation_depends_on_channel() {
        let a = derive_ibc_denom(&transfer_port(), &channel("channel-0"), &Denom::base("udym"))
            .unwrap();
        let b = derive_ibc_denom(&transfer_port(), &channel("channel-1"), &Denom::base("udym"))
            .unwrap();

        assert_ne!(a.as_str(), b.as_str());
    }

    #[test_log::test]
    fn matches_trace_based_derivation() {
        let prefixed = get_prefixed_denom(&transfer_port(), &channel("channel-3"), "udym");
        let trace = DenomTrace::parse(&prefixed);

        assert_eq!(trace.path, "transfer/channel-3");
        assert_eq!(trace.base_denom, "udym");

        let derived = derive_ibc_denom(&transfer_port(), &channel("channel-3"), &Denom::base("udym"))
            .unwrap();

        assert_eq!(trace.ibc_denom().unwrap(), derived.as_str());
        assert_eq!(derived.trace(), trace);
    }

    #[test_log::test]
    fn multi_hop_derivation_prefixes_the_path() {
        let one_hop = derive_ibc_denom(&transfer_port(), &channel("channel-0"), &Denom::base("udym"))
            .unwrap();
        let two_hops = derive_ibc_denom(&transfer_port(), &channel("channel-5"), &one_hop).unwrap();

        let trace = two_hops.trace();
        assert_eq!(trace.path, "transfer/channel-5/transfer/channel-0");
        assert_eq!(trace.base_denom, "udym");
        assert_eq!(trace.ibc_denom().unwrap(), two_hops.as_str());
    }

    #[test_log::test]
    fn parses_native_and_malformed_denoms() {
        assert_eq!(
            DenomTrace::parse("udym"),
            DenomTrace {
                path: String::new(),
                base_denom: "udym".to_string(),
            }
        );

        // A single hop without base denomination is not a path.
        assert_eq!(DenomTrace::parse("transfer/channel-0").path, "");

        // Base denominations may contain slashes themselves.
        let trace = DenomTrace::parse("transfer/channel-1/gamm/pool/1");
        assert_eq!(trace.path, "transfer/channel-1");
        assert_eq!(trace.base_denom, "gamm/pool/1");

        // Non ibc-go channel ids end the path.
        let trace = DenomTrace::parse("transfer/chan-1/udym");
        assert_eq!(trace.path, "");
        assert_eq!(trace.base_denom, "transfer/chan-1/udym");
        assert_eq!(trace.ibc_denom().unwrap(), "transfer/chan-1/udym");
    }

    #[test_log::test]
    fn prefix_manipulation() {
        let trace = DenomTrace::parse("transfer/channel-2/transfer/channel-9/udym");

        assert!(trace.has_prefix("transfer", "channel-2"));
        assert!(!trace.has_prefix("transfer", "channel-9"));
        assert!(!trace.has_prefix("transfer", "channel-22"));

        let removed = trace.remove_prefix();
        assert_eq!(removed.path, "transfer/channel-9");
        assert_eq!(removed.add_prefix("transfer", "channel-2"), trace);
    }
}
