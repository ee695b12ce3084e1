use crate::etable::{Control, ETABLE};
use crate::gasometer::{self, Gasometer};
use crate::{
	Config, Context, ExitReason, ExitSucceed, Handler, Memory, Opcode, Stack, Valids,
};

/// Where and why a frame stopped with an error or a revert.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Failure {
	pub reason: ExitReason,
	/// Byte offset of the failing instruction.
	pub position: usize,
	/// Index of the failing instruction, counting push immediates as part
	/// of their push.
	pub instruction_index: usize,
	pub opcode: Opcode,
}

/// A single execution frame: code, calldata, stack, memory and gas.
pub struct Machine<'config> {
	pub(crate) code: Vec<u8>,
	pub(crate) data: Vec<u8>,
	position: usize,
	valids: Valids,
	pub(crate) memory: Memory,
	pub(crate) stack: Stack,
	pub(crate) context: Context,
	pub(crate) gasometer: Gasometer<'config>,
	/// Output of `RETURN` or `REVERT`.
	pub(crate) retval: Vec<u8>,
	/// Returned data of the last nested frame.
	pub(crate) retbuf: Vec<u8>,
	depth: usize,
	is_static: bool,
	config: &'config Config,
	failure: Option<Failure>,
}

impl<'config> Machine<'config> {
	pub fn new(
		code: Vec<u8>,
		data: Vec<u8>,
		context: Context,
		gas_limit: u64,
		depth: usize,
		is_static: bool,
		config: &'config Config,
	) -> Self {
		let valids = Valids::new(&code);

		Self {
			code,
			data,
			position: 0,
			valids,
			memory: Memory::new(config.memory_limit),
			stack: Stack::new(config.stack_limit),
			context,
			gasometer: Gasometer::new(gas_limit, config),
			retval: Vec::new(),
			retbuf: Vec::new(),
			depth,
			is_static,
			config,
			failure: None,
		}
	}

	pub fn code(&self) -> &[u8] {
		&self.code
	}

	pub fn data(&self) -> &[u8] {
		&self.data
	}

	pub fn position(&self) -> usize {
		self.position
	}

	pub fn stack(&self) -> &Stack {
		&self.stack
	}

	pub fn memory(&self) -> &Memory {
		&self.memory
	}

	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn gasometer(&self) -> &Gasometer<'config> {
		&self.gasometer
	}

	/// Mutable gasometer, for charges made outside of instructions such
	/// as the code deposit.
	pub fn gasometer_mut(&mut self) -> &mut Gasometer<'config> {
		&mut self.gasometer
	}

	pub fn config(&self) -> &'config Config {
		self.config
	}

	pub fn depth(&self) -> usize {
		self.depth
	}

	pub fn is_static(&self) -> bool {
		self.is_static
	}

	pub(crate) fn is_jumpdest(&self, position: usize) -> bool {
		self.valids.is_jumpdest(position)
	}

	/// Output of the frame set by `RETURN` or `REVERT`.
	pub fn return_value(&self) -> &[u8] {
		&self.retval
	}

	pub fn into_return_value(self) -> Vec<u8> {
		self.retval
	}

	/// Failure record of a frame that stopped with an error or a revert.
	pub fn failure(&self) -> Option<&Failure> {
		self.failure.as_ref()
	}

	/// Run the frame until it exits.
	pub fn run(&mut self, handler: &mut dyn Handler) -> ExitReason {
		loop {
			if let Err(reason) = self.step(handler) {
				return reason;
			}
		}
	}

	/// Execute one instruction. Returns the exit reason once the frame
	/// stops.
	pub fn step(&mut self, handler: &mut dyn Handler) -> Result<(), ExitReason> {
		let position = self.position;
		let opcode = match self.code.get(position) {
			Some(byte) => Opcode(*byte),
			None => return Err(ExitSucceed::Stopped.into()),
		};

		log::trace!(target: "evm", "{} at {} gas {}", opcode, position, self.gasometer.gas());

		let cost = gasometer::opcode_cost(
			opcode,
			&self.stack,
			&*handler,
			self.context.address,
			self.is_static,
			self.gasometer.gas(),
			self.config,
		);
		if let Err(e) = cost.and_then(|cost| self.gasometer.record_opcode(cost)) {
			return Err(self.fail(e.into(), position, opcode));
		}

		match ETABLE[opcode](self, handler, position) {
			Control::Continue(n) => {
				self.position = position + n;
				Ok(())
			}
			Control::Jump(dest) => {
				self.position = dest;
				Ok(())
			}
			Control::Exit(reason) if reason.is_succeed() => Err(reason),
			Control::Exit(reason) => Err(self.fail(reason, position, opcode)),
		}
	}

	fn fail(&mut self, reason: ExitReason, position: usize, opcode: Opcode) -> ExitReason {
		if !reason.is_revert() {
			self.gasometer.fail();
			self.retval = Vec::new();
		}

		let instruction_index = crate::opcode::instruction_index(&self.code, position);
		log::debug!(
			target: "evm",
			"frame at depth {} stopped at {} ({}, instruction {}): {}",
			self.depth,
			position,
			opcode,
			instruction_index,
			reason,
		);

		self.failure = Some(Failure {
			reason: reason.clone(),
			position,
			instruction_index,
			opcode,
		});
		reason
	}
}
