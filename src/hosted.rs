//! Client for a hosted sampling service.
//!
//! A problem is submitted with `POST problems/`; the service answers with a
//! status record which is polled through `GET problems/{id}` until it is
//! `COMPLETED`, `FAILED` or `CANCELLED`, or the caller's deadline passes (the
//! problem is then cancelled with `DELETE problems/{id}`). Embedding onto the
//! hardware graph happens on the service side.

use std::thread;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::bqm::{BinaryQuadraticModel, Vartype};
use crate::config::SolverConfig;
use crate::grid::Coord;
use crate::sampler::{SampleParams, SampleRecord, SampleSet, Sampler, SamplerError};

/// Raw HTTP answer: status code and body text.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    pub status : u16,
    pub body : String,
}

/// The HTTP calls the sampler needs. Paths are relative to the endpoint.
pub trait Transport {
    fn post_json(&self, path : &str, body : &serde_json::Value) -> Result<Response, SamplerError>;
    fn get(&self, path : &str) -> Result<Response, SamplerError>;
    fn delete(&self, path : &str) -> Result<Response, SamplerError>;
}

pub struct HttpTransport {
    client : Client,
    endpoint : String,
}

fn network(e : reqwest::Error) -> SamplerError {
    if e.is_timeout() {
        SamplerError::Network(format!("request timed out: {e}"))
    } else {
        SamplerError::Network(e.to_string())
    }
}

impl HttpTransport {
    pub fn new(config : &SolverConfig) -> Result<Self, SamplerError> {
        let mut token = HeaderValue::from_str(&config.token)
            .map_err(|_| SamplerError::Auth("token is not a valid header value".into()))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert("x-auth-token", token);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .user_agent(concat!("boundary_bqm/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(network)?;
        Ok(HttpTransport { client, endpoint : config.endpoint.trim_end_matches('/').to_string() })
    }

    fn url(&self, path : &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn finish(sent : reqwest::Result<reqwest::blocking::Response>) -> Result<Response, SamplerError> {
        let resp = sent.map_err(network)?;
        let status = resp.status().as_u16();
        let body = resp.text().map_err(network)?;
        Ok(Response { status, body })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, path : &str, body : &serde_json::Value) -> Result<Response, SamplerError> {
        tracing::debug!(url = %self.url(path), "POST");
        Self::finish(self.client.post(self.url(path)).json(body).send())
    }

    fn get(&self, path : &str) -> Result<Response, SamplerError> {
        tracing::debug!(url = %self.url(path), "GET");
        Self::finish(self.client.get(self.url(path)).send())
    }

    fn delete(&self, path : &str) -> Result<Response, SamplerError> {
        tracing::debug!(url = %self.url(path), "DELETE");
        Self::finish(self.client.delete(self.url(path)).send())
    }
}

#[derive(Serialize)]
struct Submission<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    solver : Option<&'a str>,
    label : &'a str,
    #[serde(rename = "type")]
    kind : &'static str,
    data : ProblemData,
    params : ProblemParams,
}

#[derive(Serialize)]
struct ProblemData {
    vartype : Vartype,
    linear : Vec<(String, f64)>,
    quadratic : Vec<(String, String, f64)>,
    offset : f64,
}

#[derive(Serialize)]
struct ProblemParams {
    chain_strength : f64,
    num_reads : u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum Status {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct ProblemStatus {
    id : String,
    status : Status,
    #[serde(default)]
    answer : Option<Answer>,
    #[serde(default)]
    error_code : Option<u16>,
    #[serde(default)]
    error_message : Option<String>,
}

#[derive(Debug, Deserialize)]
struct Answer {
    #[serde(default)]
    vartype : Option<Vartype>,
    variables : Vec<String>,
    samples : Vec<Vec<i8>>,
    energies : Vec<f64>,
    #[serde(default)]
    num_occurrences : Option<Vec<u32>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_msg : Option<String>,
}

fn error_message(body : &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|e| e.error_msg)
        .unwrap_or_else(|| body.trim().to_string())
}

fn check(resp : Response) -> Result<String, SamplerError> {
    match resp.status {
        200..=299 => Ok(resp.body),
        401 | 403 => Err(SamplerError::Auth(error_message(&resp.body))),
        400..=499 => Err(SamplerError::InvalidParameters(error_message(&resp.body))),
        code => Err(SamplerError::Solver { code, message : error_message(&resp.body) }),
    }
}

fn parse<T : serde::de::DeserializeOwned>(body : &str) -> Result<T, SamplerError> {
    serde_json::from_str(body).map_err(|e| SamplerError::Protocol(e.to_string()))
}

fn failure(status : &ProblemStatus) -> SamplerError {
    let message = status.error_message.clone().unwrap_or_else(|| "problem failed".to_string());
    if message.to_lowercase().contains("embedding") {
        return SamplerError::Embedding(message);
    }
    SamplerError::Solver { code : status.error_code.unwrap_or(500), message }
}

fn decode(answer : Answer, submitted : Vartype) -> Result<SampleSet, SamplerError> {
    let vartype = answer.vartype.unwrap_or(submitted);
    let variables = answer
        .variables
        .iter()
        .map(|label| label.parse::<Coord>().map_err(|e| SamplerError::Protocol(e.to_string())))
        .collect::<Result<Vec<Coord>, _>>()?;
    if answer.energies.len() != answer.samples.len() {
        return Err(SamplerError::Protocol(format!(
            "{} samples but {} energies",
            answer.samples.len(),
            answer.energies.len()
        )));
    }
    let occurrences = answer.num_occurrences.unwrap_or_else(|| vec![1; answer.samples.len()]);
    if occurrences.len() != answer.samples.len() {
        return Err(SamplerError::Protocol("num_occurrences length mismatch".into()));
    }

    let mut records = Vec::with_capacity(answer.samples.len());
    for ((row, energy), num_occurrences) in answer.samples.into_iter().zip(answer.energies).zip(occurrences) {
        if row.len() != variables.len() {
            return Err(SamplerError::Protocol(format!(
                "sample has {} values for {} variables",
                row.len(),
                variables.len()
            )));
        }
        if let Some(bad) = row.iter().find(|&&x| !vartype.accepts(x)) {
            return Err(SamplerError::Protocol(format!("value {bad} is not {vartype:?}")));
        }
        let sample = variables.iter().copied().zip(row).collect();
        records.push(SampleRecord { sample, energy, num_occurrences });
    }
    Ok(SampleSet::from_records(vartype, records))
}

pub struct HostedSampler<T : Transport = HttpTransport> {
    transport : T,
    solver : Option<String>,
    poll_interval : Duration,
}

impl HostedSampler<HttpTransport> {
    pub fn connect(config : &SolverConfig) -> Result<Self, SamplerError> {
        let transport = HttpTransport::new(config)?;
        tracing::info!(endpoint = %config.endpoint, solver = ?config.solver, "using hosted sampler");
        Ok(Self::with_transport(transport, config.solver.clone(), config.poll_interval()))
    }
}

impl<T : Transport> HostedSampler<T> {
    pub fn with_transport(transport : T, solver : Option<String>, poll_interval : Duration) -> Self {
        HostedSampler { transport, solver, poll_interval }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn submission(&self, bqm : &BinaryQuadraticModel<Coord>, params : &SampleParams) -> Result<serde_json::Value, SamplerError> {
        let data = ProblemData {
            vartype : bqm.vartype(),
            linear : bqm.linear_terms().map(|(v, b)| (v.to_string(), b)).collect(),
            quadratic : bqm.quadratic_terms().map(|(u, v, b)| (u.to_string(), v.to_string(), b)).collect(),
            offset : bqm.offset(),
        };
        let submission = [Submission {
            solver : self.solver.as_deref(),
            label : &params.label,
            kind : "bqm",
            data,
            params : ProblemParams { chain_strength : params.chain_strength, num_reads : params.num_reads },
        }];
        serde_json::to_value(submission).map_err(|e| SamplerError::Protocol(e.to_string()))
    }

    fn cancel(&self, id : &str) {
        match self.transport.delete(&format!("problems/{id}")) {
            Ok(resp) if (200..300).contains(&resp.status) => tracing::warn!(id, "cancelled problem after deadline"),
            Ok(resp) => tracing::warn!(id, status = resp.status, "could not cancel problem"),
            Err(e) => tracing::warn!(id, error = %e, "could not cancel problem"),
        }
    }
}

impl<T : Transport> Sampler for HostedSampler<T> {
    fn sample(&self, bqm : &BinaryQuadraticModel<Coord>, params : &SampleParams) -> Result<SampleSet, SamplerError> {
        params.validate()?;
        let deadline = Instant::now() + params.timeout;

        let body = self.submission(bqm, params)?;
        let submitted : Vec<ProblemStatus> = parse(&check(self.transport.post_json("problems/", &body)?)?)?;
        let mut status = submitted
            .into_iter()
            .next()
            .ok_or_else(|| SamplerError::Protocol("empty submission response".into()))?;
        tracing::debug!(id = %status.id, status = ?status.status, "problem submitted");

        loop {
            match status.status {
                Status::Completed => {
                    let answer = status
                        .answer
                        .ok_or_else(|| SamplerError::Protocol("completed problem without answer".into()))?;
                    return decode(answer, bqm.vartype());
                }
                Status::Failed => return Err(failure(&status)),
                Status::Cancelled => {
                    return Err(SamplerError::Solver {
                        code : status.error_code.unwrap_or(0),
                        message : format!("problem {} was cancelled", status.id),
                    })
                }
                Status::Pending | Status::InProgress => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.cancel(&status.id);
                        return Err(SamplerError::Timeout(params.timeout));
                    }
                    thread::sleep(self.poll_interval.min(deadline - now));
                    let path = format!("problems/{}", status.id);
                    status = parse(&check(self.transport.get(&path)?)?)?;
                    tracing::debug!(id = %status.id, status = ?status.status, "polled problem");
                }
            }
        }
    }
}
