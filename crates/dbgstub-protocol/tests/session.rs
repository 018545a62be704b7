//! End-to-end sessions over in-memory and TCP transports

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use dbgstub_core::arch::{I386Register, I386State, Mock, MockState, I386};
use dbgstub_core::types::{Address, Signal};
use dbgstub_core::{BufferTransport, IoTransport, RamTarget};
use dbgstub_protocol::{run_session, SessionEnd};

struct Harness
{
    transport: BufferTransport,
    target: RamTarget<Mock>,
    state: MockState,
}

impl Harness
{
    fn new(input: &[u8]) -> Self
    {
        Self {
            transport: BufferTransport::with_input(input),
            target: RamTarget::new(16),
            state: MockState::with_registers(Signal::TRAP, [1, 2, 3, 4]),
        }
    }

    fn run(&mut self) -> SessionEnd
    {
        run_session(&mut self.transport, &mut self.target, &mut self.state).unwrap()
    }

    fn output(&self) -> &[u8]
    {
        self.transport.output()
    }
}

#[test]
fn test_register_and_unsupported_transcript()
{
    let mut h = Harness::new(b"+$g#67+$P3=000000ff#ac+$z#7a+$c#63");

    assert_eq!(h.run(), SessionEnd::Resumed);
    assert_eq!(
        h.output(),
        &b"$S05#b8+$01000000020000000300000004000000#0a+$OK#9a+$#00+"[..]
    );
    assert_eq!(h.state.registers, [1, 2, 3, 0xff00_0000]);
}

#[test]
fn test_memory_transcript()
{
    let mut h = Harness::new(b"+$m0,4#fd+$X0,3:ABC#e7+$c#63");
    h.target.load(Address::ZERO, &[0xaa, 0xbb, 0xcc, 0xdd]).unwrap();

    assert_eq!(h.run(), SessionEnd::Resumed);
    assert_eq!(h.output(), &b"$S05#b8+$aabbccdd#14+$OK#9a+"[..]);
    assert_eq!(&h.target.memory()[..4], b"ABC\xdd");
}

#[test]
fn test_line_noise_before_packet_is_skipped()
{
    let mut h = Harness::new(b"+garbage\r\n$?#3f+$c#63");

    assert_eq!(h.run(), SessionEnd::Resumed);
    assert_eq!(h.output(), &b"$S05#b8+$S05#b8+"[..]);
}

#[test]
fn test_malformed_command_does_not_end_session()
{
    let mut h = Harness::new(b"+$m0#9d+$?#3f+$c#63");

    assert_eq!(h.run(), SessionEnd::Resumed);
    assert_eq!(h.output(), &b"$S05#b8+$E00#a5+$S05#b8+"[..]);
}

#[test]
fn test_register_index_out_of_range()
{
    let mut h = Harness::new(b"+$p4#a4+$P4=ffffffff#f1+$p3#a3+$s#73");

    assert_eq!(h.run(), SessionEnd::Stepped);
    assert_eq!(h.output(), &b"$S05#b8+$E00#a5+$OK#9a+$04000000#84+"[..]);
    assert_eq!(h.state.registers, [1, 2, 3, 4]);
}

#[test]
fn test_resend_after_nack()
{
    // the debugger rejects our first reply and we do not retry on our own
    let mut h = Harness::new(b"+$?#3f-$c#63");

    assert_eq!(h.run(), SessionEnd::Resumed);
    assert_eq!(h.output(), &b"$S05#b8+$S05#b8+"[..]);
}

#[test]
fn test_disconnect_mid_session()
{
    let mut h = Harness::new(b"+$g#67+$m0,");

    assert_eq!(h.run(), SessionEnd::Disconnected);
}

struct HungUp;

impl Write for HungUp
{
    fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize>
    {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }

    fn flush(&mut self) -> std::io::Result<()>
    {
        Err(std::io::ErrorKind::BrokenPipe.into())
    }
}

#[test]
fn test_debugger_hangup_is_a_disconnect()
{
    let mut transport = IoTransport::new(&b"+$g#67"[..], HungUp);
    let mut target = RamTarget::<Mock>::new(16);
    let mut state = MockState::new(Signal::TRAP);

    assert_eq!(run_session(&mut transport, &mut target, &mut state).unwrap(), SessionEnd::Disconnected);
}

#[test]
fn test_i386_step_then_continue()
{
    let eflags = I386Register::Eflags.index();
    let mut transport = BufferTransport::with_input(b"+$s#73+$c#63");
    let mut target = RamTarget::<I386>::new(16);
    let mut state = I386State::new(Signal::TRAP);
    state.registers[eflags] = 0x202;

    assert_eq!(run_session(&mut transport, &mut target, &mut state).unwrap(), SessionEnd::Stepped);
    assert_eq!(state.registers[eflags], 0x302);

    assert_eq!(run_session(&mut transport, &mut target, &mut state).unwrap(), SessionEnd::Resumed);
    assert_eq!(state.registers[eflags], 0x202);
    assert_eq!((target.step_count(), target.resume_count()), (1, 1));
}

#[test]
fn test_session_over_tcp()
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let client = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"+$g#67+$c#63").unwrap();
        let mut received = Vec::new();
        stream.read_to_end(&mut received).unwrap();
        received
    });

    let (stream, _) = listener.accept().unwrap();
    let mut transport = IoTransport::new(stream.try_clone().unwrap(), stream);
    let mut target = RamTarget::<Mock>::new(16);
    let mut state = MockState::with_registers(Signal::TRAP, [1, 2, 3, 4]);

    let end = run_session(&mut transport, &mut target, &mut state).unwrap();
    assert_eq!(end, SessionEnd::Resumed);
    drop(transport);

    let received = client.join().unwrap();
    assert_eq!(received, b"$S05#b8+$01000000020000000300000004000000#0a+");
}
