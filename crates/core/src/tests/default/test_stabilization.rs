use std::sync::Arc;

use async_trait::async_trait;

use crate::dht::id::tests::id;
use crate::dht::Id;
use crate::dht::LocalVnode;
use crate::dht::Vnode;
use crate::error::Error;
use crate::error::Result;
use crate::tests::default::gen_vnodes_on_dummy;
use crate::tests::default::stabilize_round;
use crate::tests::default::vnode_on;
use crate::tests::default::FlakyTransport;
use crate::transport::DummyTransport;
use crate::transport::Transport;
use crate::transport::VnodeRpc;

/// Ring 10 -> 20 -> 30 -> 10 with full successor lists.
fn three_node_ring() -> Result<(DummyTransport, Vec<Arc<LocalVnode>>)> {
    let (network, vnodes) = gen_vnodes_on_dummy(&[10, 20, 30]);
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    a.set_successors(vec![b.vnode().clone(), c.vnode().clone()])?;
    b.set_successors(vec![c.vnode().clone(), a.vnode().clone()])?;
    c.set_successors(vec![a.vnode().clone(), b.vnode().clone()])?;
    Ok((network, vnodes))
}

#[tokio::test]
async fn test_lookup_answered_from_successor_list() -> Result<()> {
    let (network, vnodes) = three_node_ring()?;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    // nobody else is reachable, so the answer cannot come from an RPC
    network.deregister(b.vnode());
    network.deregister(c.vnode());

    assert_eq!(a.find_successors(1, &id(25)).await?, vec![c
        .vnode()
        .clone()]);
    assert_eq!(a.find_successors(1, &id(15)).await?, vec![b
        .vnode()
        .clone()]);
    assert_eq!(a.find_successors(2, &id(12)).await?, vec![
        b.vnode().clone(),
        c.vnode().clone()
    ]);
    Ok(())
}

#[tokio::test]
async fn test_dead_successor_evicted() -> Result<()> {
    let (network, vnodes) = three_node_ring()?;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    network.deregister(b.vnode());

    a.check_new_successor().await?;
    assert_eq!(a.successors()?, vec![c.vnode().clone()]);
    assert_eq!(a.find_successors(1, &id(25)).await?, vec![c
        .vnode()
        .clone()]);
    Ok(())
}

#[tokio::test]
async fn test_dead_successor_falls_back_to_finger() -> Result<()> {
    let (network, vnodes) = three_node_ring()?;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    // fingers 0..=3 resolve to 20, finger 4 to 30
    a.fix_finger_table().await?;
    a.fix_finger_table().await?;
    a.set_successors(vec![b.vnode().clone()])?;
    network.deregister(b.vnode());

    a.check_new_successor().await?;
    assert_eq!(a.successors()?, vec![c.vnode().clone()]);
    assert!(a.finger()?.iter().flatten().all(|v| v != b.vnode()));
    Ok(())
}

#[tokio::test]
async fn test_stabilization_converges() -> Result<()> {
    let (_network, vnodes) = gen_vnodes_on_dummy(&[10, 20, 30]);
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    a.set_successors(vec![b.vnode().clone()])?;
    b.set_successors(vec![c.vnode().clone()])?;
    c.set_successors(vec![a.vnode().clone()])?;

    stabilize_round(&vnodes).await;

    assert_eq!(a.successors()?, vec![b.vnode().clone(), c.vnode().clone()]);
    assert_eq!(b.successors()?, vec![c.vnode().clone(), a.vnode().clone()]);
    assert_eq!(c.successors()?, vec![a.vnode().clone(), b.vnode().clone()]);
    assert_eq!(a.predecessor()?, Some(c.vnode().clone()));
    assert_eq!(b.predecessor()?, Some(a.vnode().clone()));
    assert_eq!(c.predecessor()?, Some(b.vnode().clone()));
    Ok(())
}

#[tokio::test]
async fn test_new_vnode_spliced_in() -> Result<()> {
    let (network, mut vnodes) = gen_vnodes_on_dummy(&[10, 20, 30, 25]);
    let d = vnodes.pop().unwrap();
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    a.set_successors(vec![b.vnode().clone(), c.vnode().clone()])?;
    b.set_successors(vec![c.vnode().clone(), a.vnode().clone()])?;
    c.set_successors(vec![a.vnode().clone(), b.vnode().clone()])?;
    stabilize_round(&vnodes).await;
    assert!(network.is_registered(d.vnode()));

    // 25 joins knowing only its successor
    d.set_successors(vec![c.vnode().clone()])?;
    let all = vec![a.clone(), b.clone(), c.clone(), d.clone()];
    stabilize_round(&all).await;
    stabilize_round(&all).await;
    // a learns about 25 from the list of 20
    stabilize_round(&all).await;

    assert_eq!(a.successors()?, vec![b.vnode().clone(), d.vnode().clone()]);
    assert_eq!(b.successors()?, vec![d.vnode().clone(), c.vnode().clone()]);
    assert_eq!(d.successors()?, vec![c.vnode().clone(), a.vnode().clone()]);
    assert_eq!(c.predecessor()?, Some(d.vnode().clone()));
    assert_eq!(d.predecessor()?, Some(b.vnode().clone()));
    assert_eq!(a.find_successors(1, &id(22)).await?, vec![d
        .vnode()
        .clone()]);
    Ok(())
}

#[tokio::test]
async fn test_notify_round_trip() -> Result<()> {
    let (network, vnodes) = gen_vnodes_on_dummy(&[10, 20]);
    let [a, b] = vnodes.as_slice() else {
        panic!("expected two vnodes");
    };
    b.set_successors(vec![a.vnode().clone()])?;

    let list = network.notify(b.vnode(), a.vnode()).await?;
    assert_eq!(list, vec![a.vnode().clone()]);
    assert_eq!(b.predecessor()?, Some(a.vnode().clone()));

    assert_eq!(
        VnodeRpc::get_predecessor(b.as_ref()).await?,
        Some(a.vnode().clone())
    );
    Ok(())
}

#[tokio::test]
async fn test_fix_finger_round_robin() -> Result<()> {
    let (_network, vnodes) = three_node_ring()?;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    let (a, b, c) = (a.vnode().clone(), b.vnode().clone(), c.vnode().clone());
    let vn = &vnodes[0];

    // offsets of 10 are 11, 12, 14, 18, 26 and 42
    vn.fix_finger_table().await?;
    assert_eq!(vn.last_finger()?, 4);
    assert_eq!(vn.finger()?, vec![
        Some(b.clone()),
        Some(b.clone()),
        Some(b.clone()),
        Some(b.clone()),
        None,
        None
    ]);

    vn.fix_finger_table().await?;
    assert_eq!(vn.last_finger()?, 5);
    assert_eq!(vn.finger()?[4], Some(c.clone()));

    // 42 is past the successor list, it is resolved by 30
    vn.fix_finger_table().await?;
    assert_eq!(vn.last_finger()?, 0);
    assert_eq!(vn.finger()?[5], Some(a));
    Ok(())
}

#[tokio::test]
async fn test_fix_finger_failure_keeps_cursor() -> Result<()> {
    let (network, vnodes) = three_node_ring()?;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    a.fix_finger_table().await?;
    a.fix_finger_table().await?;
    assert_eq!(a.last_finger()?, 5);

    network.deregister(b.vnode());
    network.deregister(c.vnode());
    let res = a.fix_finger_table().await;
    assert!(matches!(res, Err(Error::NoReachablePath(_))));
    assert_eq!(a.last_finger()?, 5);
    assert_eq!(a.finger()?[5], None);
    Ok(())
}

#[tokio::test]
async fn test_dead_predecessor_cleared() -> Result<()> {
    let (network, vnodes) = three_node_ring()?;
    let [a, _b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };
    network.notify(a.vnode(), c.vnode()).await?;
    a.check_predecessor().await?;
    assert_eq!(a.predecessor()?, Some(c.vnode().clone()));

    network.deregister(c.vnode());
    a.check_predecessor().await?;
    assert_eq!(a.predecessor()?, None);
    Ok(())
}

#[tokio::test]
async fn test_leave_hands_over() -> Result<()> {
    let (_network, vnodes) = three_node_ring()?;
    stabilize_round(&vnodes).await;
    let [a, b, c] = vnodes.as_slice() else {
        panic!("expected three vnodes");
    };

    b.leave().await?;
    assert_eq!(a.successors()?, vec![c.vnode().clone()]);
    assert_eq!(c.predecessor()?, None);

    // a stranger leaving changes nothing
    let stranger = Vnode::new(id(40), "stranger");
    VnodeRpc::skip_successor(a.as_ref(), stranger.clone()).await?;
    VnodeRpc::clear_predecessor(a.as_ref(), stranger).await?;
    assert_eq!(a.successors()?, vec![c.vnode().clone()]);
    assert_eq!(a.predecessor()?, Some(c.vnode().clone()));
    Ok(())
}

#[tokio::test]
async fn test_unanswered_live_successor_is_kept() -> Result<()> {
    let (b, c) = (Vnode::new(id(20), "host20"), Vnode::new(id(30), "host30"));
    let vn = vnode_on(Arc::new(FlakyTransport {
        predecessor: None,
        alive: vec![b.clone()],
        ping_fails: false,
    }));
    vn.set_successors(vec![b.clone(), c.clone()])?;

    // get_predecessor fails but 20 still answers ping
    let res = vn.check_new_successor().await;
    assert!(matches!(res, Err(Error::Blackhole(_))));
    assert_eq!(vn.successors()?, vec![b, c]);
    Ok(())
}

#[tokio::test]
async fn test_dead_closer_successor_is_ignored() -> Result<()> {
    let (b, c) = (Vnode::new(id(20), "host20"), Vnode::new(id(30), "host30"));
    let closer = Vnode::new(id(15), "host15");
    let vn = vnode_on(Arc::new(FlakyTransport {
        predecessor: Some(closer.clone()),
        alive: vec![b.clone(), c.clone()],
        ping_fails: false,
    }));
    vn.set_successors(vec![b.clone(), c.clone()])?;

    vn.check_new_successor().await?;
    assert_eq!(vn.successors()?, vec![b.clone(), c.clone()]);

    // once 15 answers ping it takes over the head
    let vn = vnode_on(Arc::new(FlakyTransport {
        predecessor: Some(closer.clone()),
        alive: vec![b.clone(), closer.clone()],
        ping_fails: false,
    }));
    vn.set_successors(vec![b, c.clone()])?;
    vn.check_new_successor().await?;
    assert_eq!(vn.successors()?, vec![closer, c]);
    Ok(())
}

#[tokio::test]
async fn test_ping_failure_changes_nothing() -> Result<()> {
    let (b, c) = (Vnode::new(id(20), "host20"), Vnode::new(id(30), "host30"));
    let pred = Vnode::new(id(5), "host5");
    let vn = vnode_on(Arc::new(FlakyTransport {
        predecessor: Some(Vnode::new(id(15), "host15")),
        alive: vec![],
        ping_fails: true,
    }));
    vn.set_successors(vec![b.clone(), c.clone()])?;
    VnodeRpc::notify(&vn, pred.clone()).await?;

    // the closer candidate cannot be checked
    assert!(vn.check_new_successor().await.is_err());
    assert_eq!(vn.successors()?, vec![b, c]);

    // an unknown predecessor is not a dead one
    assert!(vn.check_predecessor().await.is_err());
    assert_eq!(vn.predecessor()?, Some(pred));
    Ok(())
}

/// Answers every lookup with an empty list.
struct EmptyAnswer;

#[async_trait]
impl VnodeRpc for EmptyAnswer {
    async fn get_predecessor(&self) -> Result<Option<Vnode>> {
        Ok(None)
    }

    async fn notify(&self, _candidate: Vnode) -> Result<Vec<Vnode>> {
        Ok(vec![])
    }

    async fn find_successors(&self, _n: usize, _key: Id) -> Result<Vec<Vnode>> {
        Ok(vec![])
    }

    async fn clear_predecessor(&self, _leaving: Vnode) -> Result<()> {
        Ok(())
    }

    async fn skip_successor(&self, _leaving: Vnode) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_empty_answer_tries_next_candidate() -> Result<()> {
    let (network, vnodes) = gen_vnodes_on_dummy(&[10, 20]);
    let [a, b] = vnodes.as_slice() else {
        panic!("expected two vnodes");
    };
    let empty = Vnode::new(id(30), "host30");
    network.register(&empty, Arc::new(EmptyAnswer));
    a.set_successors(vec![b.vnode().clone(), empty.clone()])?;
    b.set_successors(vec![empty, a.vnode().clone()])?;

    // 30 precedes 42 and is asked first, its empty answer is skipped and 20
    // routes the lookup to 10
    assert_eq!(a.find_successors(1, &id(42)).await?, vec![a.vnode().clone()]);
    Ok(())
}
