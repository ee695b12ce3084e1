//! Canonical chain records and their RLP encodings.

use crate::error::TransactionRejected;
use devnode_core::utils::keccak256;
use ethereum_types::{Bloom, BloomInput};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use primitive_types::{H160, H256, U256};
use rlp::{DecoderError, Rlp, RlpStream};

/// Hash of the empty byte sequence, the code hash of accounts with no code.
pub const EMPTY_CODE_HASH: H256 = H256([
	0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03,
	0xc0, 0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85,
	0xa4, 0x70,
]);

/// Trie-stored account.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccountRecord {
	pub nonce: U256,
	pub balance: U256,
	pub storage_root: H256,
	pub code_hash: H256,
}

impl Default for AccountRecord {
	fn default() -> Self {
		Self {
			nonce: U256::zero(),
			balance: U256::zero(),
			storage_root: crate::trie::EMPTY_TRIE_ROOT,
			code_hash: EMPTY_CODE_HASH,
		}
	}
}

impl rlp::Encodable for AccountRecord {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(4);
		stream.append(&self.nonce);
		stream.append(&self.balance);
		stream.append(&self.storage_root);
		stream.append(&self.code_hash);
	}
}

impl rlp::Decodable for AccountRecord {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 4 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		Ok(Self {
			nonce: rlp.val_at(0)?,
			balance: rlp.val_at(1)?,
			storage_root: rlp.val_at(2)?,
			code_hash: rlp.val_at(3)?,
		})
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Log {
	pub address: H160,
	pub topics: Vec<H256>,
	pub data: Vec<u8>,
}

impl Log {
	pub fn accrue_bloom(&self, bloom: &mut Bloom) {
		bloom.accrue(BloomInput::Raw(self.address.as_bytes()));
		for topic in &self.topics {
			bloom.accrue(BloomInput::Raw(topic.as_bytes()));
		}
	}
}

impl rlp::Encodable for Log {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(3);
		stream.append(&self.address);
		stream.append_list(&self.topics);
		stream.append(&self.data);
	}
}

impl rlp::Decodable for Log {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 3 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		Ok(Self {
			address: rlp.val_at(0)?,
			topics: rlp.list_at(1)?,
			data: rlp.val_at(2)?,
		})
	}
}

/// Bloom over the addresses and topics of `logs`.
pub fn logs_bloom<'a>(logs: impl IntoIterator<Item = &'a Log>) -> Bloom {
	let mut bloom = Bloom::default();
	for log in logs {
		log.accrue_bloom(&mut bloom);
	}
	bloom
}

/// Address controlled by a secp256k1 public key: the last 20 bytes of the
/// hash of its uncompressed encoding.
pub fn public_key_address(key: &VerifyingKey) -> H160 {
	let point = key.to_encoded_point(false);
	let hash = keccak256(&point.as_bytes()[1..]);
	H160::from_slice(&hash[12..])
}

fn append_action(stream: &mut RlpStream, to: &Option<H160>) {
	match to {
		Some(address) => stream.append(address),
		None => stream.append_empty_data(),
	};
}

fn decode_action(rlp: &Rlp) -> Result<Option<H160>, DecoderError> {
	if rlp.is_empty() {
		if rlp.is_data() {
			Ok(None)
		} else {
			Err(DecoderError::RlpExpectedToBeData)
		}
	} else {
		Ok(Some(rlp.as_val()?))
	}
}

/// Legacy transaction fields covered by the signature.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnsignedTransaction {
	pub nonce: U256,
	pub gas_price: U256,
	pub gas_limit: u64,
	pub to: Option<H160>,
	pub value: U256,
	pub input: Vec<u8>,
}

impl UnsignedTransaction {
	fn append_fields(&self, stream: &mut RlpStream) {
		stream.append(&self.nonce);
		stream.append(&self.gas_price);
		stream.append(&self.gas_limit);
		append_action(stream, &self.to);
		stream.append(&self.value);
		stream.append(&self.input);
	}

	/// Hash signed by the sender. With a chain id the hash follows EIP-155.
	pub fn signing_hash(&self, chain_id: Option<u64>) -> H256 {
		let mut stream = match chain_id {
			Some(_) => RlpStream::new_list(9),
			None => RlpStream::new_list(6),
		};
		self.append_fields(&mut stream);
		if let Some(chain_id) = chain_id {
			stream.append(&chain_id);
			stream.append(&0u8);
			stream.append(&0u8);
		}
		keccak256(&stream.out())
	}

	/// Attach a signature made over [`Self::signing_hash`].
	pub fn with_signature(self, chain_id: Option<u64>, recovery_id: u8, r: H256, s: H256) -> Transaction {
		let v = match chain_id {
			Some(chain_id) => recovery_id as u64 + 35 + 2 * chain_id,
			None => recovery_id as u64 + 27,
		};

		Transaction {
			nonce: self.nonce,
			gas_price: self.gas_price,
			gas_limit: self.gas_limit,
			to: self.to,
			value: self.value,
			input: self.input,
			v,
			r,
			s,
		}
	}
}

/// Signed legacy transaction. A missing `to` designates contract creation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transaction {
	pub nonce: U256,
	pub gas_price: U256,
	pub gas_limit: u64,
	pub to: Option<H160>,
	pub value: U256,
	pub input: Vec<u8>,
	pub v: u64,
	pub r: H256,
	pub s: H256,
}

impl Transaction {
	pub fn hash(&self) -> H256 {
		keccak256(&rlp::encode(self))
	}

	pub fn is_create(&self) -> bool {
		self.to.is_none()
	}

	/// Chain id bound into the signature, if any.
	pub fn chain_id(&self) -> Option<u64> {
		if self.v >= 35 {
			Some((self.v - 35) / 2)
		} else {
			None
		}
	}

	fn recovery_id(&self) -> Option<u8> {
		match self.v {
			27 | 28 => Some((self.v - 27) as u8),
			v if v >= 35 => Some(((v - 35) % 2) as u8),
			_ => None,
		}
	}

	pub fn unsigned(&self) -> UnsignedTransaction {
		UnsignedTransaction {
			nonce: self.nonce,
			gas_price: self.gas_price,
			gas_limit: self.gas_limit,
			to: self.to,
			value: self.value,
			input: self.input.clone(),
		}
	}

	pub fn signing_hash(&self) -> H256 {
		self.unsigned().signing_hash(self.chain_id())
	}

	/// Recover the sender address from the signature.
	pub fn recover_sender(&self) -> Result<H160, TransactionRejected> {
		let recovery_id = self
			.recovery_id()
			.and_then(RecoveryId::from_byte)
			.ok_or(TransactionRejected::InvalidSignature)?;

		let mut sig = [0u8; 64];
		sig[0..32].copy_from_slice(self.r.as_bytes());
		sig[32..64].copy_from_slice(self.s.as_bytes());
		let signature =
			Signature::from_slice(&sig).map_err(|_| TransactionRejected::InvalidSignature)?;

		let key = VerifyingKey::recover_from_prehash(
			self.signing_hash().as_bytes(),
			&signature,
			recovery_id,
		)
		.map_err(|_| TransactionRejected::InvalidSignature)?;

		Ok(public_key_address(&key))
	}
}

impl rlp::Encodable for Transaction {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(9);
		stream.append(&self.nonce);
		stream.append(&self.gas_price);
		stream.append(&self.gas_limit);
		append_action(stream, &self.to);
		stream.append(&self.value);
		stream.append(&self.input);
		stream.append(&self.v);
		stream.append(&U256::from_big_endian(self.r.as_bytes()));
		stream.append(&U256::from_big_endian(self.s.as_bytes()));
	}
}

impl rlp::Decodable for Transaction {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 9 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		let r: U256 = rlp.val_at(7)?;
		let s: U256 = rlp.val_at(8)?;
		Ok(Self {
			nonce: rlp.val_at(0)?,
			gas_price: rlp.val_at(1)?,
			gas_limit: rlp.val_at(2)?,
			to: decode_action(&rlp.at(3)?)?,
			value: rlp.val_at(4)?,
			input: rlp.val_at(5)?,
			v: rlp.val_at(6)?,
			r: devnode_core::utils::u256_to_h256(r),
			s: devnode_core::utils::u256_to_h256(s),
		})
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TransactionReceipt {
	pub status: bool,
	pub cumulative_gas_used: u64,
	pub logs_bloom: Bloom,
	pub logs: Vec<Log>,
}

impl TransactionReceipt {
	pub fn new(status: bool, cumulative_gas_used: u64, logs: Vec<Log>) -> Self {
		Self {
			status,
			cumulative_gas_used,
			logs_bloom: logs_bloom(&logs),
			logs,
		}
	}
}

impl rlp::Encodable for TransactionReceipt {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(4);
		stream.append(&(self.status as u8));
		stream.append(&self.cumulative_gas_used);
		stream.append(&self.logs_bloom);
		stream.append_list(&self.logs);
	}
}

impl rlp::Decodable for TransactionReceipt {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 4 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		let status: u8 = rlp.val_at(0)?;
		Ok(Self {
			status: status != 0,
			cumulative_gas_used: rlp.val_at(1)?,
			logs_bloom: rlp.val_at(2)?,
			logs: rlp.list_at(3)?,
		})
	}
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockHeader {
	pub parent_hash: H256,
	pub coinbase: H160,
	pub state_root: H256,
	pub transactions_root: H256,
	pub receipts_root: H256,
	pub logs_bloom: Bloom,
	pub difficulty: U256,
	pub number: u64,
	pub gas_limit: u64,
	pub gas_used: u64,
	pub timestamp: u64,
}

impl BlockHeader {
	pub fn hash(&self) -> H256 {
		keccak256(&rlp::encode(self))
	}
}

impl rlp::Encodable for BlockHeader {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(11);
		stream.append(&self.parent_hash);
		stream.append(&self.coinbase);
		stream.append(&self.state_root);
		stream.append(&self.transactions_root);
		stream.append(&self.receipts_root);
		stream.append(&self.logs_bloom);
		stream.append(&self.difficulty);
		stream.append(&self.number);
		stream.append(&self.gas_limit);
		stream.append(&self.gas_used);
		stream.append(&self.timestamp);
	}
}

impl rlp::Decodable for BlockHeader {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 11 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		Ok(Self {
			parent_hash: rlp.val_at(0)?,
			coinbase: rlp.val_at(1)?,
			state_root: rlp.val_at(2)?,
			transactions_root: rlp.val_at(3)?,
			receipts_root: rlp.val_at(4)?,
			logs_bloom: rlp.val_at(5)?,
			difficulty: rlp.val_at(6)?,
			number: rlp.val_at(7)?,
			gas_limit: rlp.val_at(8)?,
			gas_used: rlp.val_at(9)?,
			timestamp: rlp.val_at(10)?,
		})
	}
}

/// An assembled block: its header and the header hash.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockState {
	pub header: BlockHeader,
	pub hash: H256,
}

impl BlockState {
	pub fn new(header: BlockHeader) -> Self {
		let hash = header.hash();
		Self { header, hash }
	}

	pub fn number(&self) -> u64 {
		self.header.number
	}
}

/// Where a transaction was included.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TxLookup {
	pub block_hash: H256,
	pub index: u64,
	pub sender: H160,
}

impl rlp::Encodable for TxLookup {
	fn rlp_append(&self, stream: &mut RlpStream) {
		stream.begin_list(3);
		stream.append(&self.block_hash);
		stream.append(&self.index);
		stream.append(&self.sender);
	}
}

impl rlp::Decodable for TxLookup {
	fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
		if rlp.item_count()? != 3 {
			return Err(DecoderError::RlpIncorrectListLen);
		}

		Ok(Self {
			block_hash: rlp.val_at(0)?,
			index: rlp.val_at(1)?,
			sender: rlp.val_at(2)?,
		})
	}
}
