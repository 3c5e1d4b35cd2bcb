//! Initial information packets: where they land and who closes what.

mod common;

use common::{Offset, Recorder, drain, echo, init_tracing, within};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use weaveflow::channel::Channel;
use weaveflow::component::run;
use weaveflow::graph::Graph;

#[tokio::test]
async fn test_iip_on_unconnected_port_is_delivered_once_then_closed() {
  init_tracing();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let mut net = Graph::new();
  net.add("r", Box::new(Recorder::new(Arc::clone(&seen)))).unwrap();
  net.add_iip("r", "In", 42i64).unwrap();

  // The recorder only stops once its input closes.
  within(net.execute()).await.unwrap();
  assert_eq!(*seen.lock().unwrap(), vec![42]);
}

#[tokio::test]
async fn test_iips_on_same_port_keep_their_order() {
  let seen = Arc::new(Mutex::new(Vec::new()));
  let mut net = Graph::new();
  net.add("r", Box::new(Recorder::new(Arc::clone(&seen)))).unwrap();
  for n in [3i64, 1, 2] {
    net.add_iip("r", "in", n).unwrap();
  }

  within(net.execute()).await.unwrap();
  assert_eq!(*seen.lock().unwrap(), vec![3, 1, 2]);
}

#[tokio::test]
async fn test_iip_configures_a_component() {
  let mut net = Graph::new();
  net.add("add", Box::new(Offset::default())).unwrap();
  net.add_iip("add", "Offset", 100i64).unwrap();
  net.map_in_port("In", "add", "In").unwrap();
  net.map_out_port("Out", "add", "Out").unwrap();

  let input = Channel::<i64>::new(0);
  let output = Channel::<i64>::new(0);
  net.set_in_port("In", &input).unwrap();
  net.set_out_port("Out", &output).unwrap();

  let done = run(net);
  tokio::spawn(common::feed(input, vec![1, 2, 3]));
  let got = within(drain(&output)).await;
  within(done).await;
  assert_eq!(got, vec![101, 102, 103]);
}

#[tokio::test]
async fn test_iip_shares_external_in_port_channel() {
  let mut net = Graph::new();
  net.add("e", echo()).unwrap();
  net.map_in_port("In", "e", "In").unwrap();
  net.map_out_port("Out", "e", "Out").unwrap();

  let input = Channel::<i64>::new(0);
  let output = Channel::<i64>::new(0);
  net.set_in_port("In", &input).unwrap();
  net.set_out_port("Out", &output).unwrap();
  net.add_iip("e", "In", 1i64).unwrap();

  let done = run(net);
  let writer = input.clone();
  tokio::spawn(async move {
    let _ = writer.send(2).await;
    let _ = writer.send(3).await;
  });

  let mut got = Vec::new();
  for _ in 0..3 {
    got.push(within(output.recv()).await.unwrap());
  }
  // The graph must not have closed the caller's channel.
  assert!(!input.is_closed());
  input.close();

  assert_eq!(within(output.recv()).await, None);
  within(done).await;
  got.sort_unstable();
  assert_eq!(got, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_iip_joins_connection_channel() {
  let mut net = Graph::new();
  net.add("a", echo()).unwrap();
  net.add("b", echo()).unwrap();
  net.connect("a", "Out", "b", "In").unwrap();
  net.add_iip("b", "In", 100i64).unwrap();
  net.map_in_port("In", "a", "In").unwrap();
  net.map_out_port("Out", "b", "Out").unwrap();

  let input = Channel::<i64>::new(0);
  let output = Channel::<i64>::new(0);
  net.set_in_port("In", &input).unwrap();
  net.set_out_port("Out", &output).unwrap();

  let done = run(net);
  let writer = input.clone();
  tokio::spawn(async move {
    let _ = writer.send(5).await;
  });

  let mut got = Vec::new();
  for _ in 0..2 {
    got.push(within(output.recv()).await.unwrap());
  }
  input.close();
  assert_eq!(within(output.recv()).await, None);
  within(done).await;

  got.sort_unstable();
  assert_eq!(got, vec![5, 100]);
}

#[tokio::test]
async fn test_iips_on_connection_outlive_upstream_exit() {
  init_tracing();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let mut net = Graph::new();
  // Nothing feeds src, so it returns at once and releases src->sink.
  net.add("src", echo()).unwrap();
  net
    .add(
      "sink",
      Box::new(Recorder::with_delay(
        Arc::clone(&seen),
        Duration::from_millis(200),
      )),
    )
    .unwrap();
  net.connect_buf("src", "Out", "sink", "In", 0).unwrap();
  net.add_iip("sink", "In", 1i64).unwrap();
  net.add_iip("sink", "In", 2i64).unwrap();

  within(net.execute()).await.unwrap();
  assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
}
