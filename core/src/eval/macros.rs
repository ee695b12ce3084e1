macro_rules! try_or_fail {
	( $e:expr ) => {
		match $e {
			Ok(v) => v,
			Err(e) => return Control::Exit(e.into()),
		}
	};
}

macro_rules! pop_u256 {
	( $machine:expr, $( $x:ident ),* ) => (
		$(
			let $x = match $machine.stack.pop() {
				Ok(value) => value,
				Err(e) => return Control::Exit(e.into()),
			};
		)*
	);
}

macro_rules! pop_h256 {
	( $machine:expr, $( $x:ident ),* ) => (
		$(
			let $x = match $machine.stack.pop_h256() {
				Ok(value) => value,
				Err(e) => return Control::Exit(e.into()),
			};
		)*
	);
}

macro_rules! push_u256 {
	( $machine:expr, $( $x:expr ),* ) => (
		$(
			match $machine.stack.push($x) {
				Ok(()) => (),
				Err(e) => return Control::Exit(e.into()),
			}
		)*
	)
}

macro_rules! push_h256 {
	( $machine:expr, $( $x:expr ),* ) => (
		$(
			match $machine.stack.push(U256::from_big_endian(&$x[..])) {
				Ok(()) => (),
				Err(e) => return Control::Exit(e.into()),
			}
		)*
	)
}

macro_rules! as_usize_or_fail {
	( $v:expr ) => {{
		if $v > $crate::utils::USIZE_MAX {
			return Control::Exit(ExitError::OutOfGas.into());
		}

		$v.as_usize()
	}};
}

/// Instruction popping one word and pushing `$f` of it.
macro_rules! op1 {
	( $name:ident, $f:expr ) => {
		pub fn $name(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
			pop_u256!(machine, a);
			let f: fn(U256) -> U256 = $f;
			push_u256!(machine, f(a));
			Control::Continue(1)
		}
	};
}

/// Instruction popping two words, top first, and pushing `$f` of them.
macro_rules! op2 {
	( $name:ident, $f:expr ) => {
		pub fn $name(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
			pop_u256!(machine, a, b);
			let f: fn(U256, U256) -> U256 = $f;
			push_u256!(machine, f(a, b));
			Control::Continue(1)
		}
	};
}

macro_rules! op3 {
	( $name:ident, $f:expr ) => {
		pub fn $name(machine: &mut Machine<'_>, _handler: &mut dyn Handler, _position: usize) -> Control {
			pop_u256!(machine, a, b, c);
			let f: fn(U256, U256, U256) -> U256 = $f;
			push_u256!(machine, f(a, b, c));
			Control::Continue(1)
		}
	};
}
