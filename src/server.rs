use std::future;
use std::io;
use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_modbus::{Exception, Request, Response};
use tokio_modbus::server::tcp::{accept_tcp_connection, Server};

use crate::bank::RegisterBank;
use crate::config::RegisterMapping;
use crate::registers::{HeaterState, Kelvin};

/// Modbus service answering requests from the shared register bank.
pub struct ModbusService {
    bank: RegisterBank,
}

impl ModbusService {
    pub fn new(bank: RegisterBank) -> Self {
        Self { bank }
    }

    fn handle(&self, req: Request<'static>) -> Result<Response, Exception> {
        match req {
            Request::ReadHoldingRegisters(addr, count) => self
                .bank
                .read_holding_registers(addr, count)
                .map(Response::ReadHoldingRegisters),
            Request::ReadInputRegisters(addr, count) => self
                .bank
                .read_input_registers(addr, count)
                .map(Response::ReadInputRegisters),
            Request::ReadCoils(addr, count) => self.bank.read_coils(addr, count).map(Response::ReadCoils),
            Request::WriteSingleRegister(addr, value) => {
                self.bank.write_holding_register(addr, value);
                Ok(Response::WriteSingleRegister(addr, value))
            }
            Request::WriteMultipleRegisters(addr, values) => {
                self.bank.write_holding_registers(addr, &values)?;
                Ok(Response::WriteMultipleRegisters(addr, values.len() as u16))
            }
            Request::WriteSingleCoil(addr, value) => {
                self.bank.write_coil(addr, value);
                Ok(Response::WriteSingleCoil(addr, value))
            }
            Request::WriteMultipleCoils(addr, values) => {
                self.bank.write_coils(addr, &values)?;
                Ok(Response::WriteMultipleCoils(addr, values.len() as u16))
            }
            _ => Err(Exception::IllegalFunction),
        }
    }
}

impl tokio_modbus::server::Service for ModbusService {
    type Request = Request<'static>;
    type Response = Response;
    type Exception = Exception;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        tracing::debug!("request: {req:?}");
        let res = self.handle(req);
        if let Err(code) = &res {
            tracing::debug!("answering with exception {code:?}");
        }
        future::ready(res)
    }
}

/// Writes the power-on state of the device into the bank.
pub fn seed_registers(bank: &RegisterBank, registers: &RegisterMapping, initial: Kelvin) {
    bank.write_holding_register(registers.temperature_address, initial.to_register());
    bank.write_holding_register(registers.heater_state_address, HeaterState::Off.to_register());
    bank.write_coil(registers.heater_coil_address, false);
}

/// Accepts Modbus TCP connections on `listener` until an accept error occurs.
///
/// Each connection gets its own [`ModbusService`] over the same bank.
pub async fn serve(listener: TcpListener, bank: RegisterBank) -> io::Result<()> {
    let server = Server::new(listener);

    let new_service = move |socket_addr: SocketAddr| -> io::Result<Option<ModbusService>> {
        tracing::info!("client connected from {socket_addr}");
        Ok(Some(ModbusService::new(bank.clone())))
    };
    let on_connected = |stream: TcpStream, socket_addr: SocketAddr| {
        let new_service = new_service.clone();
        async move { accept_tcp_connection(stream, socket_addr, new_service) }
    };
    let on_process_error = |err: io::Error| {
        tracing::warn!("modbus connection error: {err}");
    };

    server.serve(&on_connected, on_process_error).await
}
